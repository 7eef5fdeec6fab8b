//! Synthetic value generators
//!
//! A closed registry of value kinds, each backed by a generator function
//! over a seedable random source.

use chrono::{Duration, Utc};

/// Locale of generated names and places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl Locale {
    /// Accepts `ru`, `ru_RU`, `ru-RU`; anything unknown is English
    pub fn parse(raw: &str) -> Self {
        let lang = raw
            .split(['_', '-'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match lang.as_str() {
            "ru" => Locale::Ru,
            _ => Locale::En,
        }
    }
}

/// Every value kind the generator knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Email,
    Name,
    FirstName,
    LastName,
    Username,
    Password,
    PhoneNumber,
    City,
    Country,
    Address,
    StreetAddress,
    Company,
    Word,
    Sentence,
    Uuid,
    Number,
    Boolean,
    Url,
    Ipv4,
    Date,
    UserAgent,
}

impl GeneratorKind {
    /// Look up a kind by name, ignoring case, underscores and punctuation
    ///
    /// `phone_number`, `phoneNumber` and `PHONE-NUMBER` all name the same kind.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let kind = match key.as_str() {
            "email" | "safeemail" | "freeemail" => GeneratorKind::Email,
            "name" | "fullname" => GeneratorKind::Name,
            "firstname" => GeneratorKind::FirstName,
            "lastname" | "surname" => GeneratorKind::LastName,
            "username" | "login" => GeneratorKind::Username,
            "password" => GeneratorKind::Password,
            "phone" | "phonenumber" => GeneratorKind::PhoneNumber,
            "city" => GeneratorKind::City,
            "country" => GeneratorKind::Country,
            "address" => GeneratorKind::Address,
            "streetaddress" | "street" => GeneratorKind::StreetAddress,
            "company" => GeneratorKind::Company,
            "word" => GeneratorKind::Word,
            "sentence" | "text" => GeneratorKind::Sentence,
            "uuid" => GeneratorKind::Uuid,
            "number" | "randomnumber" | "digits" => GeneratorKind::Number,
            "boolean" | "bool" => GeneratorKind::Boolean,
            "url" => GeneratorKind::Url,
            "ipv4" | "ip" => GeneratorKind::Ipv4,
            "date" => GeneratorKind::Date,
            "useragent" => GeneratorKind::UserAgent,
            _ => return None,
        };
        Some(kind)
    }

    /// Bare words accepted before `:bindingKey` without the `generator.` prefix
    pub fn shorthand(word: &str) -> Option<Self> {
        let kind = match word {
            "email" => GeneratorKind::Email,
            "name" => GeneratorKind::Name,
            "username" => GeneratorKind::Username,
            "password" => GeneratorKind::Password,
            "phone" | "phone_number" => GeneratorKind::PhoneNumber,
            "city" => GeneratorKind::City,
            "country" => GeneratorKind::Country,
            "address" => GeneratorKind::Address,
            "surname" | "last_name" => GeneratorKind::LastName,
            "first_name" | "firstname" => GeneratorKind::FirstName,
            _ => return None,
        };
        Some(kind)
    }
}

struct Vocabulary {
    first_names: &'static [&'static str],
    last_names: &'static [&'static str],
    cities: &'static [&'static str],
    countries: &'static [&'static str],
    streets: &'static [&'static str],
    companies: &'static [&'static str],
    words: &'static [&'static str],
    phone_prefix: &'static str,
}

static EN: Vocabulary = Vocabulary {
    first_names: &[
        "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda",
        "David", "Elizabeth", "William", "Barbara", "Richard", "Susan", "Thomas", "Jessica",
    ],
    last_names: &[
        "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
        "Wilson", "Anderson", "Taylor", "Moore", "Jackson", "Martin", "Lee", "Thompson",
    ],
    cities: &[
        "Springfield", "Riverside", "Franklin", "Greenville", "Bristol", "Clinton",
        "Fairview", "Salem", "Madison", "Georgetown",
    ],
    countries: &[
        "United States", "Canada", "United Kingdom", "Australia", "Germany", "France",
        "Japan", "Brazil", "India", "Norway",
    ],
    streets: &[
        "Main Street", "Oak Avenue", "Maple Drive", "Cedar Lane", "Pine Road",
        "Elm Street", "Lakeview Court", "Hillside Avenue",
    ],
    companies: &[
        "Acme", "Globex", "Initech", "Umbrella", "Stark Industries", "Wayne Enterprises",
        "Hooli", "Vandelay Industries",
    ],
    words: &[
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "harbor", "meadow",
        "silver", "orbit", "quartz", "river", "summit", "timber", "violet", "willow",
    ],
    phone_prefix: "+1",
};

static RU: Vocabulary = Vocabulary {
    first_names: &[
        "Александр", "Алексей", "Андрей", "Борис", "Дмитрий", "Евгений", "Иван", "Игорь",
        "Кирилл", "Максим", "Михаил", "Николай", "Павел", "Роман", "Сергей", "Ярослав",
    ],
    last_names: &[
        "Иванов", "Петров", "Сидоров", "Козлов", "Новиков", "Морозов", "Волков",
        "Соловьев", "Васильев", "Зайцев", "Павлов", "Семенов", "Федоров", "Михайлов",
    ],
    cities: &[
        "Москва", "Санкт-Петербург", "Казань", "Новосибирск", "Екатеринбург", "Самара",
        "Омск", "Пермь", "Воронеж", "Тверь",
    ],
    countries: &[
        "Россия", "Беларусь", "Казахстан", "Армения", "Грузия", "Сербия", "Франция",
        "Германия", "Италия", "Япония",
    ],
    streets: &[
        "ул. Ленина", "ул. Гагарина", "пр. Мира", "ул. Садовая", "ул. Лесная",
        "ул. Школьная", "наб. Речная", "пер. Тихий",
    ],
    companies: &[
        "Рога и Копыта", "Север", "Вектор", "Гранит", "Меридиан", "Альянс", "Восход",
        "Техносервис",
    ],
    words: &[
        "альфа", "берег", "ветер", "город", "дорога", "звезда", "лес", "море", "облако",
        "поле", "река", "солнце",
    ],
    phone_prefix: "+7",
};

/// Latin names used wherever the value must be ASCII (emails, logins)
const LATIN_NAMES: &[&str] = &[
    "alex", "maria", "ivan", "anna", "john", "olga", "peter", "kate", "max", "nina",
    "oleg", "lisa", "roman", "vera", "denis", "sofia",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "test.local"];

const TLDS: &[&str] = &["com", "org", "net", "io", "dev"];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "curl/8.7.1",
];

const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Random value generator for one scenario run
pub struct Generator {
    rng: fastrand::Rng,
    locale: Locale,
}

impl Generator {
    pub fn new(locale: Locale) -> Self {
        Self {
            rng: fastrand::Rng::new(),
            locale,
        }
    }

    /// Deterministic generator for reproducible runs
    pub fn with_seed(locale: Locale, seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            locale,
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn vocabulary(&self) -> &'static Vocabulary {
        match self.locale {
            Locale::En => &EN,
            Locale::Ru => &RU,
        }
    }

    fn pick(&mut self, items: &'static [&'static str]) -> &'static str {
        items[self.rng.usize(..items.len())]
    }

    fn digits(&mut self, count: usize) -> String {
        (0..count).map(|_| self.rng.digit(10)).collect()
    }

    pub fn generate(&mut self, kind: GeneratorKind) -> String {
        let vocab = self.vocabulary();
        match kind {
            GeneratorKind::Email => {
                let user = self.username();
                let domain = self.pick(EMAIL_DOMAINS);
                format!("{user}@{domain}")
            }
            GeneratorKind::Name => {
                let first = self.pick(vocab.first_names);
                let last = self.pick(vocab.last_names);
                format!("{first} {last}")
            }
            GeneratorKind::FirstName => self.pick(vocab.first_names).to_string(),
            GeneratorKind::LastName => self.pick(vocab.last_names).to_string(),
            GeneratorKind::Username => self.username(),
            GeneratorKind::Password => self.password(),
            GeneratorKind::PhoneNumber => format!("{}{}", vocab.phone_prefix, self.digits(10)),
            GeneratorKind::City => self.pick(vocab.cities).to_string(),
            GeneratorKind::Country => self.pick(vocab.countries).to_string(),
            GeneratorKind::Address => {
                let street = self.street_address();
                let city = self.pick(vocab.cities);
                let zip = self.digits(6);
                format!("{street}, {city}, {zip}")
            }
            GeneratorKind::StreetAddress => self.street_address(),
            GeneratorKind::Company => self.pick(vocab.companies).to_string(),
            GeneratorKind::Word => self.pick(vocab.words).to_string(),
            GeneratorKind::Sentence => {
                let count = self.rng.usize(4..=8);
                let words: Vec<&str> = (0..count).map(|_| self.pick(vocab.words)).collect();
                let mut sentence = words.join(" ");
                if let Some(first) = sentence.chars().next() {
                    let upper: String = first.to_uppercase().collect();
                    sentence.replace_range(..first.len_utf8(), &upper);
                }
                sentence.push('.');
                sentence
            }
            GeneratorKind::Uuid => self.uuid(),
            GeneratorKind::Number => self.rng.u32(1..=99_999).to_string(),
            GeneratorKind::Boolean => self.rng.bool().to_string(),
            GeneratorKind::Url => {
                let word = self.pick(EN.words);
                let tld = self.pick(TLDS);
                format!("https://www.{word}.{tld}/")
            }
            GeneratorKind::Ipv4 => {
                let octets: Vec<String> = (0..4).map(|_| self.rng.u8(1..=254).to_string()).collect();
                octets.join(".")
            }
            GeneratorKind::Date => {
                let days = self.rng.i64(1..=7300);
                (Utc::now().date_naive() - Duration::days(days))
                    .format("%Y-%m-%d")
                    .to_string()
            }
            GeneratorKind::UserAgent => self.pick(USER_AGENTS).to_string(),
        }
    }

    fn username(&mut self) -> String {
        let first = self.pick(LATIN_NAMES);
        let last = self.pick(LATIN_NAMES);
        let suffix = self.rng.u16(10..10_000);
        format!("{first}.{last}{suffix}")
    }

    fn street_address(&mut self) -> String {
        let streets = self.vocabulary().streets;
        let street = self.pick(streets);
        let number = self.rng.u16(1..=250);
        match self.locale {
            Locale::En => format!("{number} {street}"),
            Locale::Ru => format!("{street}, д. {number}"),
        }
    }

    /// 12 characters with at least one lower, upper and digit
    fn password(&mut self) -> String {
        let mut chars = vec![
            LOWER[self.rng.usize(..LOWER.len())],
            UPPER[self.rng.usize(..UPPER.len())],
            DIGITS[self.rng.usize(..DIGITS.len())],
        ];
        let pool: Vec<u8> = [LOWER, UPPER, DIGITS].concat();
        while chars.len() < 12 {
            chars.push(pool[self.rng.usize(..pool.len())]);
        }
        self.rng.shuffle(&mut chars);
        String::from_utf8_lossy(&chars).into_owned()
    }

    /// Random version 4 UUID drawn from this generator's RNG
    fn uuid(&mut self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.fill(&mut bytes);
        uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .hyphenated()
            .to_string()
    }
}
