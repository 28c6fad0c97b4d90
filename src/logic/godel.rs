//! Gödel numbering of formulas
//!
//! A formula is tokenized into symbols, each symbol gets a fixed code, and
//! the sequence `c1, c2, ... cn` is encoded as `p1^c1 * p2^c2 * ... pn^cn`
//! over the first `n` primes. The result quickly outgrows 64 bits, so it is
//! produced as a decimal string.

/// Longest symbol sequence accepted for encoding
pub const MAX_SYMBOLS: usize = 256;

/// Largest code accepted in a raw sequence
pub const MAX_CODE: u64 = 1024;

const SYMBOLS: &[(&str, u64)] = &[
    ("and", 2),
    ("or", 3),
    ("not", 5),
    ("implies", 7),
    ("iff", 11),
    ("forall", 13),
    ("exists", 17),
    ("equals", 19),
    ("not_equals", 23),
    ("less_than", 29),
    ("greater_than", 31),
    ("less_equal", 37),
    ("greater_equal", 41),
    ("plus", 43),
    ("minus", 47),
    ("multiply", 53),
    ("divide", 59),
    ("modulo", 61),
    ("power", 67),
    ("(", 71),
    (")", 73),
    (",", 79),
    (".", 83),
    ("variable", 89),
    ("constant", 97),
    ("function_app", 101),
    ("predicate", 103),
    ("lambda", 107),
    ("substitution", 109),
];

const ALIASES: &[(&str, &str)] = &[
    ("&&", "and"),
    ("||", "or"),
    ("!", "not"),
    ("=>", "implies"),
    ("<=>", "iff"),
    ("==", "equals"),
    ("=", "equals"),
    ("!=", "not_equals"),
    ("<", "less_than"),
    (">", "greater_than"),
    ("<=", "less_equal"),
    (">=", "greater_equal"),
    ("+", "plus"),
    ("-", "minus"),
    ("*", "multiply"),
    ("/", "divide"),
    ("%", "modulo"),
    ("^", "power"),
    ("**", "power"),
];

/// Code for a named symbol or its operator spelling
pub fn symbol_code(symbol: &str) -> Option<u64> {
    let name = ALIASES
        .iter()
        .find(|(alias, _)| *alias == symbol)
        .map_or(symbol, |(_, name)| *name);
    SYMBOLS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, code)| *code)
}

/// Split a formula into symbol codes.
///
/// Keywords and operators map to their own codes, parentheses and
/// punctuation to theirs. Other words are variables when they start with a
/// letter or underscore and constants otherwise.
pub fn tokenize(formula: &str) -> Vec<u64> {
    let chars: Vec<char> = formula.chars().collect();
    let mut codes = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_alphanumeric() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let code = symbol_code(&word).unwrap_or(if c.is_ascii_digit() {
                97
            } else {
                89
            });
            codes.push(code);
            continue;
        }

        let three: String = chars[i..(i + 3).min(chars.len())].iter().collect();
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let (code, width) = if let Some(code) = symbol_code(&three).filter(|_| three.len() == 3) {
            (code, 3)
        } else if let Some(code) = symbol_code(&two).filter(|_| two.chars().count() == 2) {
            (code, 2)
        } else {
            (symbol_code(&c.to_string()).unwrap_or(97), 1)
        };
        codes.push(code);
        i += width;
    }

    codes
}

/// Encode a sequence of codes as a product of prime powers
pub fn encode_sequence(codes: &[u64]) -> Result<String, String> {
    if codes.len() > MAX_SYMBOLS {
        return Err(format!("sequence longer than {} symbols", MAX_SYMBOLS));
    }
    if let Some(code) = codes.iter().find(|c| **c > MAX_CODE) {
        return Err(format!("code {} exceeds {}", code, MAX_CODE));
    }

    let mut number = BigNat::one();
    for (prime, code) in primes(codes.len()).into_iter().zip(codes) {
        for _ in 0..*code {
            number.mul_small(prime);
        }
    }
    Ok(number.to_string())
}

/// Encode formula text
pub fn encode_formula(formula: &str) -> Result<String, String> {
    encode_sequence(&tokenize(formula))
}

/// First `n` primes
fn primes(n: usize) -> Vec<u64> {
    let mut found: Vec<u64> = Vec::with_capacity(n);
    let mut candidate = 2u64;
    while found.len() < n {
        if found
            .iter()
            .take_while(|p| **p * **p <= candidate)
            .all(|p| candidate % p != 0)
        {
            found.push(candidate);
        }
        candidate += 1;
    }
    found
}

/// Little-endian base 10^9 natural number, enough for prime-power products
struct BigNat {
    limbs: Vec<u64>,
}

const LIMB_BASE: u64 = 1_000_000_000;

impl BigNat {
    fn one() -> Self {
        Self { limbs: vec![1] }
    }

    fn mul_small(&mut self, factor: u64) {
        let mut carry = 0u64;
        for limb in self.limbs.iter_mut() {
            let product = *limb * factor + carry;
            *limb = product % LIMB_BASE;
            carry = product / LIMB_BASE;
        }
        while carry > 0 {
            self.limbs.push(carry % LIMB_BASE);
            carry /= LIMB_BASE;
        }
    }
}

impl std::fmt::Display for BigNat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut limbs = self.limbs.iter().rev();
        if let Some(first) = limbs.next() {
            write!(f, "{}", first)?;
        }
        for limb in limbs {
            write!(f, "{:09}", limb)?;
        }
        Ok(())
    }
}
