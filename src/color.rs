use std::fmt;

/// An sRGB color as reported by computed styles.
///
/// Channels are stored as bytes, alpha as a fraction in `[0, 1]`. The
/// canonical form ([`Color::canonical`]) is the key colors are grouped by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f64,
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("silver", [192, 192, 192]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("white", [255, 255, 255]),
    ("maroon", [128, 0, 0]),
    ("red", [255, 0, 0]),
    ("purple", [128, 0, 128]),
    ("fuchsia", [255, 0, 255]),
    ("magenta", [255, 0, 255]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("olive", [128, 128, 0]),
    ("yellow", [255, 255, 0]),
    ("navy", [0, 0, 128]),
    ("blue", [0, 0, 255]),
    ("teal", [0, 128, 128]),
    ("aqua", [0, 255, 255]),
    ("cyan", [0, 255, 255]),
    ("orange", [255, 165, 0]),
    ("rebeccapurple", [102, 51, 153]),
];

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    pub fn rgba(r: u8, g: u8, b: u8, alpha: f64) -> Self {
        Self {
            r,
            g,
            b,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// Parses hex, `rgb()`/`rgba()`, `hsl()`/`hsla()`, `transparent` and
    /// basic named colors. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_ascii_lowercase();

        if text == "transparent" {
            return Some(Self::rgba(0, 0, 0, 0.0));
        }

        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex);
        }

        if let Some(args) = function_args(&text, &["rgba", "rgb"]) {
            return parse_rgb_args(args);
        }

        if let Some(args) = function_args(&text, &["hsla", "hsl"]) {
            return parse_hsl_args(args);
        }

        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == text)
            .map(|(_, [r, g, b])| Self::rgb(*r, *g, *b))
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha == 0.0
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha < 1.0
    }

    /// `#rrggbbaa` when the color is translucent, `#rrggbb` otherwise.
    pub fn canonical(&self) -> String {
        if self.has_alpha() {
            let alpha = (self.alpha * 255.0).round() as u8;
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, alpha)
        } else {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn function_args<'a>(text: &'a str, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        text.strip_prefix(name)?
            .trim_start()
            .strip_prefix('(')?
            .strip_suffix(')')
    })
}

fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };

    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    let alpha = if expanded.len() == 8 {
        byte(6)? as f64 / 255.0
    } else {
        1.0
    };

    Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, alpha))
}

fn parse_channel(part: &str) -> Option<u8> {
    let value = match part.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok()? * 255.0 / 100.0,
        None => part.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(part: Option<&&str>) -> Option<f64> {
    match part {
        None => Some(1.0),
        Some(part) => match part.strip_suffix('%') {
            Some(percent) => Some(percent.parse::<f64>().ok()? / 100.0),
            None => part.parse::<f64>().ok(),
        },
    }
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    Some(Color::rgba(
        parse_channel(parts[0])?,
        parse_channel(parts[1])?,
        parse_channel(parts[2])?,
        parse_alpha(parts.get(3))?,
    ))
}

fn parse_hsl_args(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let hue = parts[0].trim_end_matches("deg").parse::<f64>().ok()?;
    let saturation = parts[1].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
    let lightness = parts[2].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
    let alpha = parse_alpha(parts.get(3))?;

    let [r, g, b] = hsl_to_rgb(hue, saturation.clamp(0.0, 1.0), lightness.clamp(0.0, 1.0));
    Some(Color::rgba(r, g, b, alpha))
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> [u8; 3] {
    let hue = hue.rem_euclid(360.0) / 360.0;
    let q = if lightness < 0.5 {
        lightness * (1.0 + saturation)
    } else {
        lightness + saturation - lightness * saturation
    };
    let p = 2.0 * lightness - q;

    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        let value = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };

    [
        channel(hue + 1.0 / 3.0),
        channel(hue),
        channel(hue - 1.0 / 3.0),
    ]
}
