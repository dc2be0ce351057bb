//! Cross-language translation tests.
//!
//! Each test reads source in one language and checks the shape of what the
//! other writers produce from the same IR.

use polyglot::ir::{
    BinaryOp, Class, ComprehensionKind, Expr, FieldInit, Function, Param, Property, Stmt, Type,
};
use polyglot::types::{Language, from_canonical, to_canonical};
use polyglot::{StructureEq, TranslateConfig, reader_for_language, translate, writer_for_language};

const LANGUAGES: [&str; 5] = ["python", "javascript", "go", "rust", "csharp"];

fn read(lang: &str, source: &str, filename: &str) -> polyglot::Module {
    reader_for_language(lang)
        .expect("reader")
        .read(source, filename)
        .expect("parse failed")
}

fn write(lang: &str, module: &polyglot::Module) -> String {
    writer_for_language(lang)
        .expect("writer")
        .write(module)
        .expect("generation failed")
}

#[test]
fn primitive_types_survive_every_language() {
    for lang in Language::ALL {
        for ty in [Type::int(), Type::float(), Type::string(), Type::bool(), Type::any()] {
            let native = from_canonical(lang, &ty);
            assert_eq!(to_canonical(lang, &native), ty, "{lang}: {native}");
        }
    }
}

#[test]
fn python_function_to_go_gains_error_result() {
    let module = read(
        "python",
        "def calculate(a: int, b: int) -> int:\n    return a + b\n",
        "calc.py",
    );
    assert_eq!(module.functions.len(), 1);
    let func = &module.functions[0];
    assert_eq!(func.params.len(), 2);
    assert!(func.params.iter().all(|p| p.ty == Type::int()));
    assert_eq!(
        func.body,
        vec![Stmt::Return(Some(Expr::binary(
            Expr::ident("a"),
            BinaryOp::Add,
            Expr::ident("b"),
        )))]
    );

    let go = write("go", &module);
    assert!(go.contains("func Calculate(a int, b int) (int, error) {\n\treturn (a + b), nil\n}"));
}

#[test]
fn python_locals_and_constants_reach_go() {
    let source = "LIMIT = 10\n\ndef count() -> int:\n    total = 0\n    total = total + 1\n    return total\n";
    let out = reader_for_language("python")
        .unwrap()
        .read_with_diagnostics(source, "count.py")
        .unwrap();
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    let module = out.module;
    assert_eq!(module.constants.len(), 1);
    assert_eq!(module.constants[0].name, "LIMIT");
    let mut unhandled = false;
    polyglot::ir::walk_body(&module.functions[0].body, &mut |s| {
        unhandled |= matches!(s, Stmt::Unhandled(_));
    });
    assert!(!unhandled);

    let go = write("go", &module);
    assert!(go.contains(" = 10\n"), "{go}");
    assert!(go.contains("\ttotal := 0\n"), "{go}");
    assert!(go.contains("\ttotal += 1\n"), "{go}");
}

#[test]
fn comprehension_survives_go_loop() {
    let python = "def doubled(items: list[int]) -> list[int]:\n    return [x * 2 for x in items if x > 0]\n";
    let go = translate(python, "nums.py", "go").unwrap();
    assert!(go.contains("for _, x := range items {"));
    assert!(go.contains("append("));

    let module = read("go", &go, "nums.go");
    let mut found = None;
    polyglot::ir::walk_body_exprs(&module.functions[0].body, &mut |e| {
        if let Expr::Comprehension(c) = e {
            found = Some((c.kind, c.iterator.clone(), c.condition.is_some()));
        }
    });
    assert_eq!(found, Some((ComprehensionKind::List, "x".to_string(), true)));

    let back = write("python", &module);
    assert!(back.contains("for x in items if"));
}

#[test]
fn pair_comprehension_destructures_entries() {
    let python = "def doubled(d: dict[str, int]) -> dict[str, int]:\n    return {k: v * 2 for k, v in d.items() if v > 0}\n";
    let module = read("python", python, "pairs.py");

    let rust = write("rust", &module);
    assert!(
        rust.contains("d.iter().filter(|(k, v)| (v > 0)).map(|(k, v)| (k, (v * 2))).collect::<HashMap<_, _>>()"),
        "{rust}"
    );
    assert!(!rust.contains(".iter().iter()"), "{rust}");

    let cs = write("csharp", &module);
    assert!(
        cs.contains("return d.Where(entry => (entry.Value > 0)).ToDictionary(entry => entry.Key, entry => (entry.Value * 2));"),
        "{cs}"
    );
}

#[test]
fn go_error_tuple_round_trip() {
    let source = "package users\n\ntype User struct {\n\tName string `json:\"name\"`\n\tAge  int    `json:\"age\"`\n}\n\nfunc GetUser(id int) (User, error) {\n\tuser := User{Name: \"Alice\", Age: 30}\n\treturn user, nil\n}\n";
    let module = read("go", source, "users.go");
    let go = write("go", &module);
    assert!(go.contains("\treturn user, nil\n"));
    assert!(go.contains("user := User{Name: \"Alice\", Age: 30}"));

    let again = read("go", &go, "users.go");
    assert!(again.structure_eq(&module));
}

#[test]
fn go_multi_return_round_trip() {
    let source = "package pairs\n\nfunc Pair() (int, string) {\n\treturn 1, \"a\"\n}\n";
    let module = read("go", source, "pairs.go");
    let pair = &module.functions[0];
    assert_eq!(pair.return_type, Some(Type::tuple(vec![Type::int(), Type::string()])));
    assert!(pair.throws.is_empty());

    let go = write("go", &module);
    assert!(go.contains("func Pair() (int, string, error) {\n\treturn 1, \"a\", nil\n}"), "{go}");

    let again = read("go", &go, "pairs.go");
    assert_eq!(again.functions[0].return_type, pair.return_type);
    assert_eq!(again.functions[0].body, pair.body);

    let rust = write("rust", &module);
    assert!(rust.contains("pub fn pair() -> (i64, String) {\n    (1, \"a\".to_string())\n}"), "{rust}");
    let cs = write("csharp", &module);
    assert!(cs.contains("return (1, \"a\");"), "{cs}");
    let py = write("python", &module);
    assert!(py.contains("    return 1, \"a\"\n"), "{py}");
}

#[test]
fn go_multi_return_call_destructures() {
    let source = "package pairs\n\nfunc Pair() (int, string) {\n\treturn 1, \"a\"\n}\n\nfunc Use() string {\n\tn, s := Pair()\n\treturn s\n}\n";
    let go = write("go", &read("go", source, "pairs.go"));
    assert!(go.contains("\tn, s, err := Pair()\n\tif err != nil {"), "{go}");
}

#[test]
fn untyped_value_returns_get_a_result_type() {
    let source = "function positives(items) {\n  return items.filter(x => x > 0).map(x => x * 2);\n}\n";
    let module = read("javascript", source, "nums.js");
    assert_eq!(module.functions[0].return_type, None);

    let go = write("go", &module);
    assert!(!go.contains("func Positives(items interface{}) {"), "{go}");
    assert!(go.contains("func Positives(items interface{}) ("), "{go}");
    assert!(go.contains(", error) {"), "{go}");
    let cs = write("csharp", &module);
    assert!(!cs.contains("void Positives"), "{cs}");
    let rust = write("rust", &module);
    assert!(rust.contains("pub fn positives(items: Box<dyn Any>) -> "), "{rust}");
}

#[test]
fn named_struct_literals_stay_named() {
    let sources = [
        (
            "python",
            "user.py",
            "from dataclasses import dataclass\n\n@dataclass\nclass User:\n    name: str\n    age: int\n\ndef make() -> User:\n    return User(name=\"Alice\", age=30)\n",
        ),
        (
            "javascript",
            "user.js",
            "class User {\n  constructor({ name, age }) {\n    this.name = name;\n    this.age = age;\n  }\n}\n\nfunction make() {\n  return new User({ name: \"Alice\", age: 30 });\n}\n",
        ),
        (
            "go",
            "user.go",
            "package user\n\ntype User struct {\n\tName string\n\tAge  int\n}\n\nfunc Make() User {\n\treturn User{Name: \"Alice\", Age: 30}\n}\n",
        ),
        (
            "csharp",
            "User.cs",
            "public class User\n{\n    public string Name { get; set; }\n    public int Age { get; set; }\n}\n\npublic static class Factory\n{\n    public static User Make()\n    {\n        return new User { Name = \"Alice\", Age = 30 };\n    }\n}\n",
        ),
        (
            "rust",
            "user.rs",
            "pub struct User {\n    pub name: String,\n    pub age: i64,\n}\n\npub fn make() -> User {\n    User { name: \"Alice\".to_string(), age: 30 }\n}\n",
        ),
    ];
    for (from, filename, source) in sources {
        let module = read(from, source, filename);
        for to in LANGUAGES {
            let out = write(to, &module);
            assert!(out.contains("Alice"), "{from} -> {to}:\n{out}");
            assert!(!out.contains("\"Alice\", 30"), "{from} -> {to} went positional:\n{out}");
        }
    }
}

#[test]
fn positional_literal_uses_class_constructor() {
    let mut user = Class::new("User");
    user.properties = vec![Property::new("name", Type::string()), Property::new("age", Type::int())];
    user.constructor = Some(Function::new(
        "constructor",
        vec![Param::new("name", Type::string()), Param::new("age", Type::int())],
        vec![],
    ));
    let literal = Expr::StructLiteral {
        type_name: "User".into(),
        fields: vec![
            FieldInit::positional(Expr::string("Alice")),
            FieldInit::positional(Expr::int(30)),
        ],
    };
    let mut module = polyglot::Module::new("users");
    module.classes.push(user);
    module.functions.push(
        Function::new("make", vec![], vec![Stmt::return_stmt(Some(literal))])
            .returning(Type::new("User")),
    );

    let rust = write("rust", &module);
    assert!(rust.contains("User::new("), "{rust}");
    assert!(!rust.contains("field0"), "{rust}");
    let go = write("go", &module);
    assert!(go.contains("NewUser(\"Alice\", 30)"), "{go}");
    assert!(!go.contains("&User{\"Alice\""), "{go}");
}

#[test]
fn async_functions_keep_their_marker() {
    let module = read(
        "python",
        "async def fetch(url: str) -> str:\n    return await get(url)\n",
        "jobs.py",
    );
    assert!(module.functions[0].is_async);

    assert!(write("python", &module).contains("async def fetch(url: str) -> str:"));
    assert!(write("javascript", &module).contains("async function fetch(url) {"));
    assert!(write("rust", &module).contains("pub async fn fetch(url: String)"));
    assert!(write("csharp", &module).contains("public static async Task<string> Fetch(string url)"));

    let go = write("go", &module);
    assert!(!go.contains("async"));
    assert!(!go.contains("\tgo "));
}

#[test]
fn go_map_becomes_csharp_dictionary() {
    let source = "package stats\n\nfunc Total(m map[string]int) int {\n\treturn len(m)\n}\n";
    let cs = translate(source, "stats.go", "csharp").unwrap();
    assert!(cs.contains("Dictionary<string, int> m"));
    assert!(cs.contains("using System.Collections.Generic;"));
}

#[test]
fn generator_options_apply() {
    let config = TranslateConfig::from_toml_str(
        "[go]\npackage = \"core\"\n\n[csharp]\nnamespace = \"Acme.Core\"\nfunctions_class = \"Helpers\"\n",
    )
    .unwrap();
    let source = "def one() -> int:\n    return 1\n";
    let go = polyglot::translate_with_config(source, "one.py", "go", &config).unwrap();
    assert!(go.starts_with("package core\n"));
    let cs = polyglot::translate_with_config(source, "one.py", "csharp", &config).unwrap();
    assert!(cs.starts_with("namespace Acme.Core;\n"));
    assert!(cs.contains("public static class Helpers"));
}

#[test]
fn unhandled_constructs_become_placeholders() {
    let out = reader_for_language("python")
        .unwrap()
        .read_with_diagnostics("def f(path):\n    with open(path) as fh:\n        return fh.read()\n", "f.py")
        .unwrap();
    assert!(!out.diagnostics.is_empty());
    for to in LANGUAGES {
        let text = write(to, &out.module);
        assert!(text.contains("unhandled"), "{to}:\n{text}");
    }
}
