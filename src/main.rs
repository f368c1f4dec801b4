use std::process::ExitCode;

fn main() -> ExitCode {
    batch_ocr::run()
}
