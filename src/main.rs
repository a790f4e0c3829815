use env_logger::Env;

fn main() -> anyhow::Result<()> {
    let args = ledger_sync::args::parse();
    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    ledger_sync::cli::main(args)
}
