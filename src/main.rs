fn main() {
    if let Err(err) = sqlite_chat::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
