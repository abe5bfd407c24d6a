//! Synthetic image bodies and mock responses

use wiremock::ResponseTemplate;

/// Minimal baseline JPEG: SOI, SOF0 with the given size, SOS, filler, EOI
pub fn jpeg(width: u16, height: u16, total_len: usize) -> Vec<u8> {
    let mut buf = vec![0xFF, 0xD8];
    buf.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(&width.to_be_bytes());
    buf.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
    buf.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    while buf.len() + 2 < total_len {
        buf.push(0x55);
    }
    buf.extend_from_slice(&[0xFF, 0xD9]);
    buf
}

/// 200 response carrying a JPEG body
pub fn jpeg_response(width: u16, height: u16, total_len: usize) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "image/jpeg")
        .set_body_bytes(jpeg(width, height, total_len))
}

/// 200 response carrying an HTML page
pub fn html_response(html: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(html.into(), "text/html; charset=utf-8")
}

/// Listing page whose only image is a wide banner
pub fn banner_page() -> String {
    r#"<html><body>
        <header><img src="/img/banner-top.jpg" alt="Suscríbete"></header>
        <p>Hoy en portada</p>
    </body></html>"#
        .to_string()
}

/// Listing page with a cover container
pub fn cover_container_page(image_path: &str) -> String {
    format!(
        r#"<html><body>
            <div id="portada"><img src="{}" alt="Portada"></div>
        </body></html>"#,
        image_path
    )
}
