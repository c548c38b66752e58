//! Name mangling (§4.5, last paragraph): constructors as `-T`, methods as
//! `-T-m`, and free functions passed through unless they collide with a
//! runtime name, in which case a `--` prefix is prepended.

const RUNTIME_NAMES: &[&str] = &["printf", "malloc", "llvm.memcpy.p0i8.p0i8.i32"];

pub fn constructor_name(template: &str) -> String {
    format!("-{template}")
}

pub fn method_name(template: &str, method: &str) -> String {
    format!("-{template}-{method}")
}

pub fn free_function_name(name: &str) -> String {
    if RUNTIME_NAMES.contains(&name) {
        format!("--{name}")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_and_method_names() {
        assert_eq!(constructor_name("Foo"), "-Foo");
        assert_eq!(method_name("Foo", "bar"), "-Foo-bar");
    }

    #[test]
    fn free_function_passthrough_unless_colliding() {
        assert_eq!(free_function_name("add"), "add");
        assert_eq!(free_function_name("malloc"), "--malloc");
    }

    #[test]
    fn mangling_is_injective_across_kinds() {
        let names = [
            constructor_name("Foo"),
            method_name("Foo", "bar"),
            method_name("Foo", "baz"),
            free_function_name("bar"),
            free_function_name("malloc"),
        ];
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                assert_ne!(names[i], names[j]);
            }
        }
    }
}
