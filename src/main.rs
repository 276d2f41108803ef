use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    routechat::cli::main()
}
