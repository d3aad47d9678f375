//! Date-pattern matcher for run directory names
//!
//! A run directory is named `<prefix><timestamp>`, where the timestamp is
//! rendered from a strftime-style template. The same compiled template parses
//! the timestamp back out of a directory name. Only fixed-width numeric fields
//! are supported so that parsing is unambiguous:
//!
//! | Placeholder | Field  | Width |
//! |-------------|--------|-------|
//! | `%Y`        | year   | 4     |
//! | `%m`        | month  | 2     |
//! | `%d`        | day    | 2     |
//! | `%H`        | hour   | 2     |
//! | `%M`        | minute | 2     |
//! | `%S`        | second | 2     |
//! | `%%`        | literal `%` | 1 |
//!
//! Names that do not parse are reported as "no match". Retention never
//! evicts such entries, so a template that no longer matches the names on
//! disk stops retention from freeing space.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{VaultError, VaultResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl Field {
    fn width(self) -> usize {
        match self {
            Field::Year => 4,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Field(Field),
    Literal(String),
}

/// A compiled date template
#[derive(Debug, Clone)]
pub struct DatePattern {
    template: String,
    tokens: Vec<Token>,
}

impl DatePattern {
    /// Compile a template such as `%Y-%m-%d_%H-%M-%S`
    pub fn compile(template: &str) -> VaultResult<Self> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            let field = match chars.next() {
                Some('Y') => Field::Year,
                Some('m') => Field::Month,
                Some('d') => Field::Day,
                Some('H') => Field::Hour,
                Some('M') => Field::Minute,
                Some('S') => Field::Second,
                Some('%') => {
                    literal.push('%');
                    continue;
                }
                Some(other) => {
                    return Err(VaultError::Config(format!(
                        "Unsupported date placeholder '%{}' in '{}'",
                        other, template
                    )))
                }
                None => {
                    return Err(VaultError::Config(format!(
                        "Dangling '%' at end of date format '{}'",
                        template
                    )))
                }
            };

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Field(field));
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        if !tokens.iter().any(|t| matches!(t, Token::Field(Field::Year))) {
            return Err(VaultError::Config(format!(
                "Date format '{}' must contain a year (%Y)",
                template
            )));
        }

        Ok(Self {
            template: template.to_string(),
            tokens,
        })
    }

    /// The template this pattern was compiled from
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render a timestamp
    pub fn render(&self, at: NaiveDateTime) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::Field(Field::Year) => out.push_str(&format!("{:04}", at.year())),
                Token::Field(Field::Month) => out.push_str(&format!("{:02}", at.month())),
                Token::Field(Field::Day) => out.push_str(&format!("{:02}", at.day())),
                Token::Field(Field::Hour) => out.push_str(&format!("{:02}", at.hour())),
                Token::Field(Field::Minute) => out.push_str(&format!("{:02}", at.minute())),
                Token::Field(Field::Second) => out.push_str(&format!("{:02}", at.second())),
            }
        }
        out
    }

    /// Build a directory name: prefix followed by the rendered timestamp
    pub fn directory_name(&self, prefix: &str, at: NaiveDateTime) -> String {
        format!("{}{}", prefix, self.render(at))
    }

    /// Extract the timestamp embedded in `name` after `prefix`
    ///
    /// Returns `None` when the prefix is absent, when any field has the
    /// wrong width or is not numeric, when literals differ, when anything
    /// trails the timestamp, or when the fields do not form a real date.
    pub fn parse(&self, name: &str, prefix: &str) -> Option<NaiveDateTime> {
        let mut rest = name.strip_prefix(prefix)?;

        let mut year = None;
        let (mut month, mut day) = (1, 1);
        let (mut hour, mut minute, mut second) = (0, 0, 0);

        for token in &self.tokens {
            match token {
                Token::Literal(s) => {
                    rest = rest.strip_prefix(s.as_str())?;
                }
                Token::Field(field) => {
                    let width = field.width();
                    let digits = rest.get(..width)?;
                    if !digits.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                    let value: u32 = digits.parse().ok()?;
                    rest = &rest[width..];

                    match field {
                        Field::Year => year = Some(value as i32),
                        Field::Month => month = value,
                        Field::Day => day = value,
                        Field::Hour => hour = value,
                        Field::Minute => minute = value,
                        Field::Second => second = value,
                    }
                }
            }
        }

        if !rest.is_empty() {
            return None;
        }

        NaiveDate::from_ymd_opt(year?, month, day)?.and_hms_opt(hour, minute, second)
    }
}
