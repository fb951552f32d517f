// Automatically generate README.md from rustdoc.

fn main() {
    generate_readme::from_main().unwrap();
}
