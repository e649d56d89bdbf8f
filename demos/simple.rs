use stone_core::{compile, SourceSpec};

fn main() {
    let spec = "namespace files\n\
struct File\n    path String\n    size UInt64 = 0\n\
    example default\n        path = \"/hello.txt\"\n\
union LookupError\n    not_found\n    other*\n\
route get_file(String, File, LookupError)\n";

    match compile(&[SourceSpec::new("files.stone", spec)]) {
        Ok(compilation) => {
            for ns in compilation.api.namespaces() {
                println!("namespace {}", ns.name);
                for id in ns.linearized() {
                    println!("  {}", compilation.api.type_def(*id).name());
                }
                for route in &ns.routes {
                    println!("  route {}", route.name);
                }
            }
            if let Some(Ok(json)) = compilation.example_to_json("files", "File", "default") {
                println!("example File.default = {json}");
            }
        }
        Err(failure) => {
            for record in failure.records() {
                eprintln!(
                    "{}:{}:{}: {}",
                    record.file, record.line, record.column, record.message
                );
            }
            std::process::exit(1);
        }
    }
}
