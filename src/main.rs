fn main() {
    if let Err(err) = csv_steward::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
