#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match handoff_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[handoff-core] {error}");
            eprintln!("{}", handoff_core::runtime::USAGE);
            std::process::exit(2);
        }
    };

    if let Err(error) = handoff_core::runtime::run_with_options(options).await {
        eprintln!("[handoff-core] {error}");
        std::process::exit(1);
    }
}
