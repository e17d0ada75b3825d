fn main() {
    if let Err(err) = wirepath::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
