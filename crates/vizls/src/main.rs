//
// main.rs
//

mod backend;
mod builtins;
mod chain;
mod completions;
mod config;
mod definition;
mod handlers;
mod preprocess;
mod recognizer;
mod resolver;
mod scope;
mod signature;
mod state;
mod symbols;

use std::env;

fn print_usage() {
    println!(
        "vizls {}, a static VizScript Language Server.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: vizls [OPTIONS]

Available options:

--stdio                      Start the LSP server using stdio transport
--version                    Print the version
--help                       Print this help message

"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut use_stdio = false;

    for arg in argv {
        match arg.as_str() {
            "--stdio" => use_stdio = true,
            "--version" => {
                println!("vizls {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
        }
    }

    if !use_stdio {
        print_usage();
        return Ok(());
    }

    env_logger::init();

    backend::start_lsp().await
}
