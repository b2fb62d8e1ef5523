/// A multiplier written directly after a numeric literal (`10MB`, `30s`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    pub suffix: &'static str,
    pub factor: i64,
}

const UNITS: &[Unit] = &[
    // sizes
    Unit { suffix: "KB", factor: 1 << 10 },
    Unit { suffix: "MB", factor: 1 << 20 },
    Unit { suffix: "GB", factor: 1 << 30 },
    Unit { suffix: "TB", factor: 1 << 40 },
    // durations, in seconds
    Unit { suffix: "s", factor: 1 },
    Unit { suffix: "m", factor: 60 },
    Unit { suffix: "h", factor: 3_600 },
    Unit { suffix: "d", factor: 86_400 },
    Unit { suffix: "w", factor: 604_800 },
];

impl Unit {
    pub fn lookup(suffix: &str) -> Option<Unit> {
        UNITS.iter().find(|u| u.suffix == suffix).copied()
    }

    /// Splits `10MB` into `("10", Some(MB))`. Text without a known suffix is
    /// returned unchanged.
    pub fn split(text: &str) -> (&str, Option<Unit>) {
        // hex digits overlap with unit letters, so prefixed integers never carry units
        let digits = text.trim_start_matches('-');
        if digits.starts_with("0x") || digits.starts_with("0X") {
            return (text, None);
        }
        let start = text
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_alphabetic())
            .last()
            .map(|(i, _)| i);
        match start {
            Some(i) => match Unit::lookup(&text[i..]) {
                Some(unit) => (&text[..i], Some(unit)),
                None => (text, None),
            },
            None => (text, None),
        }
    }
}
