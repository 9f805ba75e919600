fn main() -> std::process::ExitCode {
    scrapec_drv::run()
}
