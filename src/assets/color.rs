use crate::foundation::core::Rgba8Premul;
use serde::Deserialize;

/// Straight-alpha RGBA8 color as used by layers and backdrops.
///
/// Serializes as a `#rrggbb` / `#rrggbbaa` hex string (the tool's native
/// color notation); deserializes from hex, an `{r,g,b,a}` object with 0-255
/// channels, or a 3/4-element array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorSpec {
    /// Red, straight alpha.
    pub r: u8,
    /// Green, straight alpha.
    pub g: u8,
    /// Blue, straight alpha.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl ColorSpec {
    /// Construct from straight RGBA8 channels.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// The default layer fill, amber `#fbbf24`.
    pub fn amber() -> Self {
        Self::from_rgba8(0xfb, 0xbf, 0x24, 0xff)
    }

    /// Convert to premultiplied RGBA8.
    pub fn to_premul(self) -> Rgba8Premul {
        Rgba8Premul::from_straight_rgba(self.r, self.g, self.b, self.a)
    }

    /// Lowercase hex form; alpha is omitted when fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 0xff {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl serde::Serialize for ColorSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ColorSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            RgbaObj {
                r: u8,
                g: u8,
                b: u8,
                #[serde(default = "opaque")]
                a: u8,
            },
            Arr(Vec<u8>),
        }

        fn opaque() -> u8 {
            0xff
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => parse_hex(&s).map_err(serde::de::Error::custom),
            Repr::RgbaObj { r, g, b, a } => Ok(Self::from_rgba8(r, g, b, a)),
            Repr::Arr(v) => {
                if v.len() == 3 {
                    Ok(Self::from_rgba8(v[0], v[1], v[2], 0xff))
                } else if v.len() == 4 {
                    Ok(Self::from_rgba8(v[0], v[1], v[2], v[3]))
                } else {
                    Err(serde::de::Error::custom(
                        "rgba array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                    ))
                }
            }
        }
    }
}

fn parse_hex(s: &str) -> Result<ColorSpec, String> {
    let s = s.trim();
    let s = s.strip_prefix('#').unwrap_or(s);
    if !s.is_ascii() {
        return Err("hex color must be #rrggbb or #rrggbbaa (case-insensitive)".to_owned());
    }

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    match s.len() {
        6 => Ok(ColorSpec::from_rgba8(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            0xff,
        )),
        8 => Ok(ColorSpec::from_rgba8(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        )),
        _ => Err("hex color must be #rrggbb or #rrggbbaa (case-insensitive)".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_hex_rgb_and_rgba() {
        let c: ColorSpec = serde_json::from_value(json!("#FF0000")).unwrap();
        assert_eq!(c, ColorSpec::from_rgba8(255, 0, 0, 255));

        let c: ColorSpec = serde_json::from_value(json!("#0000ff80")).unwrap();
        assert_eq!(c, ColorSpec::from_rgba8(0, 0, 255, 0x80));
    }

    #[test]
    fn parses_rgba_object_and_array() {
        let c: ColorSpec = serde_json::from_value(json!({"r": 10, "g": 20, "b": 30})).unwrap();
        assert_eq!(c, ColorSpec::from_rgba8(10, 20, 30, 255));

        let c: ColorSpec = serde_json::from_value(json!([10, 20, 30, 40])).unwrap();
        assert_eq!(c, ColorSpec::from_rgba8(10, 20, 30, 40));

        assert!(serde_json::from_value::<ColorSpec>(json!([1, 2])).is_err());
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(serde_json::from_value::<ColorSpec>(json!("#f00")).is_err());
        assert!(serde_json::from_value::<ColorSpec>(json!("#zzzzzz")).is_err());
        assert!(serde_json::from_value::<ColorSpec>(json!("#aébcd")).is_err());
    }

    #[test]
    fn amber_round_trips_as_short_hex() {
        let json = serde_json::to_value(ColorSpec::amber()).unwrap();
        assert_eq!(json, json!("#fbbf24"));

        let back: ColorSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, ColorSpec::amber());
    }

    #[test]
    fn premul_conversion_rounds() {
        let p = ColorSpec::from_rgba8(100, 50, 200, 128).to_premul();
        assert_eq!(p.a, 128);
        assert_eq!(p.r, ((100u16 * 128 + 127) / 255) as u8);
    }
}
