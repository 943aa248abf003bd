use anyhow::Result;
use clap::Parser;
use tenrso_cli::{init_tracing, run, Args};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;

    let summary = run(&args)?;

    for (iteration, err) in summary.errors.iter().enumerate() {
        println!("iter {:>4}  relative error {:.6e}", iteration + 1, err);
    }
    print!("{}", summary.report);
    Ok(())
}
