use clap::Parser;

use etcd_operator::cli;

#[tokio::main]
async fn main() {
    // kube's rustls transport needs a process-wide crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let args = cli::Cli::parse();
    if let Err(e) = cli::run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
