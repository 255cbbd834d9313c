//! Synthetic values for form fields.

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::infer::LogicalType;
use crate::schema::FieldSchema;

/// Length of every generated password.
pub const PASSWORD_LEN: usize = 12;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas",
    "Sarah", "Charles", "Karen", "Daniel", "Nancy", "Matthew", "Lisa",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

const WORDS: &[&str] = &[
    "alpha", "amet", "beatae", "culpa", "dolor", "dolore", "enim", "eos", "esse", "fugiat",
    "ipsum", "labore", "lorem", "magnam", "minima", "nemo", "nihil", "odio", "quasi", "quia",
    "ratione", "sit", "tempora", "ullam", "velit", "veniam", "vitae", "voluptas",
];

const PHONE_FORMATS: &[&str] = &["###-###-####", "(###) ###-####", "###.###.####", "+1-###-###-####"];

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+";

/// Produces plausible values from a caller-supplied randomness source.
pub struct ValueGenerator<R> {
    rng: R,
}

impl<R: Rng> ValueGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Value for `ty`, or `None` when the field should be left alone
    /// (a select with no options).
    pub fn generate(&mut self, ty: LogicalType, field: &FieldSchema) -> Option<String> {
        let value = match ty {
            LogicalType::Email => self.email(),
            LogicalType::Phone => self.phone(),
            LogicalType::Name => self.full_name(),
            LogicalType::Date => self.date(),
            LogicalType::Zip => self.digits(5),
            LogicalType::Password => self.password(),
            LogicalType::Select => return field.options().choose(&mut self.rng).cloned(),
            LogicalType::Text => self.word(),
        };
        Some(value)
    }

    pub fn email(&mut self) -> String {
        let first = pick(&mut self.rng, FIRST_NAMES).to_lowercase();
        let last = pick(&mut self.rng, LAST_NAMES).to_lowercase();
        let n: u8 = self.rng.gen_range(1..100);
        let domain = pick(&mut self.rng, EMAIL_DOMAINS);
        format!("{first}.{last}{n}@{domain}")
    }

    pub fn phone(&mut self) -> String {
        let format = pick(&mut self.rng, PHONE_FORMATS);
        self.from_template(format)
    }

    pub fn full_name(&mut self) -> String {
        let first = pick(&mut self.rng, FIRST_NAMES);
        let last = pick(&mut self.rng, LAST_NAMES);
        format!("{first} {last}")
    }

    /// ISO date between 1970-01-01 and 2005-12-31.
    pub fn date(&mut self) -> String {
        let offset = self.rng.gen_range(0..=13_148);
        NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|start| start.checked_add_signed(Duration::days(offset)))
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "1990-01-01".to_string())
    }

    /// Exactly [`PASSWORD_LEN`] characters with at least one lower-case
    /// letter, upper-case letter, digit and symbol.
    pub fn password(&mut self) -> String {
        let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
        let mut chars: Vec<char> = classes
            .iter()
            .map(|class| *class.choose(&mut self.rng).unwrap_or(&b'a') as char)
            .collect();
        let all: Vec<u8> = classes.concat();
        while chars.len() < PASSWORD_LEN {
            chars.push(*all.choose(&mut self.rng).unwrap_or(&b'a') as char);
        }
        chars.shuffle(&mut self.rng);
        chars.into_iter().collect()
    }

    pub fn word(&mut self) -> String {
        pick(&mut self.rng, WORDS).to_string()
    }

    /// `n` random decimal digits.
    pub fn digits(&mut self, n: usize) -> String {
        (0..n).map(|_| self.rng.gen_range(b'0'..=b'9') as char).collect()
    }

    /// `n` random ASCII letters.
    pub fn letters(&mut self, n: usize) -> String {
        let alphabet = [LOWER, UPPER].concat();
        (0..n)
            .map(|_| *alphabet.choose(&mut self.rng).unwrap_or(&b'a') as char)
            .collect()
    }

    /// Expand a template where each `#` becomes a random digit and every
    /// other character is kept verbatim.
    pub fn from_template(&mut self, template: &str) -> String {
        template
            .chars()
            .map(|c| {
                if c == '#' {
                    self.rng.gen_range(b'0'..=b'9') as char
                } else {
                    c
                }
            })
            .collect()
    }
}

fn pick<R: Rng>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}
