use qrcode::{QrCode, render::unicode};

/// Draws `url` as a QR code out of half-block characters, two modules per
/// line. Colors are inverted so the code scans on a dark terminal.
pub fn render(url: &str) -> anyhow::Result<String> {
    let code = QrCode::new(url.as_bytes())?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}
