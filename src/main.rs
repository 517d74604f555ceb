#[tokio::main]
async fn main() {
    if let Err(e) = voucher_ocr::run().await {
        eprintln!("voucher-ocr: {e}");
        std::process::exit(1);
    }
}
