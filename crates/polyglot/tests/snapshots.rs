//! Snapshot tests for writer output.
//!
//! Each test reads one small program and pins what a writer emits for it.
//! Run `cargo insta review` to update snapshots after intentional changes.

use polyglot::{Module, reader_for_language, writer_for_language};

fn read(lang: &str, source: &str, filename: &str) -> Module {
    reader_for_language(lang)
        .expect("reader")
        .read(source, filename)
        .expect("parse failed")
}

fn write(lang: &str, module: &Module) -> String {
    writer_for_language(lang)
        .expect("writer")
        .write(module)
        .expect("generation failed")
}

// ============================================================================
// One Python function, every writer
// ============================================================================

mod calculate {
    use super::*;

    fn module() -> Module {
        read(
            "python",
            "def calculate(a: int, b: int) -> int:\n    return a + b\n",
            "calc.py",
        )
    }

    #[test]
    fn python() {
        insta::assert_snapshot!(write("python", &module()), @r"
# calc


def calculate(a: int, b: int) -> int:
    return (a + b)
");
    }

    #[test]
    fn javascript() {
        insta::assert_snapshot!(write("javascript", &module()), @r"
// calc

/**
 * @param {integer} a
 * @param {integer} b
 * @returns {integer}
 */
function calculate(a, b) {
  return (a + b);
}
");
    }

    #[test]
    fn go() {
        insta::assert_snapshot!(write("go", &module()), @r"
package calc

func Calculate(a int, b int) (int, error) {
	return (a + b), nil
}
");
    }

    #[test]
    fn rust() {
        insta::assert_snapshot!(write("rust", &module()), @r"
//! calc

pub fn calculate(a: i64, b: i64) -> i64 {
    (a + b)
}
");
    }

    #[test]
    fn csharp() {
        insta::assert_snapshot!(write("csharp", &module()), @r"
namespace Calc;

public static class Functions
{
    public static int Calculate(int a, int b)
    {
        return (a + b);
    }
}
");
    }
}

// ============================================================================
// Go error tuples
// ============================================================================

#[test]
fn go_struct_and_error_tuple() {
    let source = "package users\n\ntype User struct {\n\tName string `json:\"name\"`\n\tAge  int    `json:\"age\"`\n}\n\nfunc GetUser(id int) (User, error) {\n\tuser := User{Name: \"Alice\", Age: 30}\n\treturn user, nil\n}\n";
    let module = read("go", source, "users.go");
    insta::assert_snapshot!(write("go", &module), @r#"
package users

type User struct {
	Name string `json:"name"`
	Age  int    `json:"age"`
}

func GetUser(id int) (User, error) {
	user := User{Name: "Alice", Age: 30}
	return user, nil
}
"#);
}
