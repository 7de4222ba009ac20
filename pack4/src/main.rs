mod cli;

pub fn main() -> ! {
    env_logger::builder().parse_env("PACK4_LOG").init();
    if let Err(err) = cli::run(std::env::args_os()) {
        eprintln!("{}", err);
        std::process::exit(1)
    } else {
        std::process::exit(0)
    }
}
