fn main() {
    if let Err(err) = migcheck::cli::run() {
        migcheck::ui::eprintln_error(&err);
        std::process::exit(migcheck::exit::exit_code(&err));
    }
}
