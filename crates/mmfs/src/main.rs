mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Mount, Unmount, Version};

command_enum! {
    (Mount, Mount),
    (Unmount, Unmount),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let guards = mmfs::logging::init(args.log_level, args.log_dir.as_deref());

    let ctx = cli::op::OpContext::new(args.config);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush buffered log lines before exiting
    drop(guards);
    std::process::exit(code);
}
