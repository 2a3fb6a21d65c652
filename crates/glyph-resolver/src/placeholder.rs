//! Deterministic placeholder artwork.
//!
//! When an image blob is unreadable the resolver substitutes an SVG card
//! derived only from the image's logical id and the document's display name.
//! The same inputs always produce byte-identical output, so placeholders are
//! stable across processes and can be asserted on in tests.

use glyph_types::LogicalId;

const WIDTH: u32 = 350;
const HEIGHT: u32 = 490;

/// Palette and pattern derived from the seed bytes.
struct Style {
    hue: u16,
    accent_hue: u16,
    stripes: u8,
}

impl Style {
    fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            hue: u16::from_be_bytes([seed[0], seed[1]]) % 360,
            accent_hue: u16::from_be_bytes([seed[2], seed[3]]) % 360,
            stripes: 3 + seed[4] % 5,
        }
    }
}

fn seed(id: &LogicalId, display_name: Option<&str>) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"glyph-placeholder-v1:");
    hasher.update(id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(display_name.unwrap_or("").as_bytes());
    *hasher.finalize().as_bytes()
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Render the placeholder SVG for an unreadable image.
pub fn placeholder_svg(id: &LogicalId, display_name: Option<&str>) -> Vec<u8> {
    let seed = seed(id, display_name);
    let style = Style::from_seed(&seed);
    let title = match (display_name, id.index()) {
        (Some(name), _) if !name.trim().is_empty() => escape_xml(name.trim()),
        (_, Some(n)) => format!("#{n}"),
        _ => escape_xml(id.as_str()),
    };

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">"
    ));
    svg.push_str(&format!(
        "<rect width=\"{WIDTH}\" height=\"{HEIGHT}\" rx=\"18\" fill=\"hsl({},45%,22%)\"/>",
        style.hue
    ));
    let band = HEIGHT / u32::from(style.stripes);
    for i in 0..u32::from(style.stripes) {
        if i % 2 == 1 {
            svg.push_str(&format!(
                "<rect y=\"{}\" width=\"{WIDTH}\" height=\"{band}\" fill=\"hsl({},40%,30%)\" opacity=\"0.5\"/>",
                i * band,
                style.hue
            ));
        }
    }
    svg.push_str(&format!(
        "<rect x=\"12\" y=\"12\" width=\"{}\" height=\"{}\" rx=\"12\" fill=\"none\" stroke=\"hsl({},70%,60%)\" stroke-width=\"4\"/>",
        WIDTH - 24,
        HEIGHT - 24,
        style.accent_hue
    ));
    svg.push_str(&format!(
        "<text x=\"{}\" y=\"{}\" font-family=\"sans-serif\" font-size=\"28\" text-anchor=\"middle\" fill=\"#ffffff\">{title}</text>",
        WIDTH / 2,
        HEIGHT / 2
    ));
    svg.push_str(&format!(
        "<text x=\"{}\" y=\"{}\" font-family=\"monospace\" font-size=\"12\" text-anchor=\"middle\" fill=\"hsl({},70%,75%)\">{}</text>",
        WIDTH / 2,
        HEIGHT - 32,
        style.accent_hue,
        hex::encode(&seed[..4])
    ));
    svg.push_str("</svg>");
    svg.into_bytes()
}
