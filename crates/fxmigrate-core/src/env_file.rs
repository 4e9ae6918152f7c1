//! Flat `KEY=value` environment files.

/// Ordered set of environment entries. Later writes to an existing key
/// replace its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `KEY=value` lines. Blank lines and `#` comments are skipped.
    /// Double-quoted values are unescaped.
    pub fn parse(text: &str) -> Self {
        let mut env = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                env.set(key.trim(), unquote(value.trim()));
            }
        }
        env
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Add every entry of `other`, replacing values of existing keys.
    pub fn extend(&mut self, other: &EnvFile) {
        for (key, value) in &other.entries {
            self.set(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One `KEY=value` line per entry. Values that would not survive a
    /// line-based read are written double-quoted with escapes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            if needs_quotes(value) {
                out.push_str(&quote(value));
            } else {
                out.push_str(value);
            }
            out.push('\n');
        }
        out
    }
}

fn needs_quotes(value: &str) -> bool {
    value.contains(['\n', '\r'])
        || value.starts_with('"')
        || value.trim() != value
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unquote(value: &str) -> String {
    let inner = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => return value.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let env = EnvFile::parse("# generated\nTAB_ENDPOINT=https://x\n\nBOT_ID = abc\n");
        assert_eq!(env.get("BOT_ID"), Some("abc"));
        assert_eq!(env.render(), "TAB_ENDPOINT=https://x\nBOT_ID=abc\n");
    }

    #[test]
    fn test_set_keeps_position() {
        let mut env = EnvFile::new();
        env.set("A", "1");
        env.set("B", "2");
        env.set("A", "3");
        assert_eq!(env.render(), "A=3\nB=2\n");
    }

    #[test]
    fn test_multiline_value_is_quoted() {
        let mut env = EnvFile::new();
        env.set("CERT", "line one\nline \"two\"");
        env.set("PLAIN", "abc");
        let text = env.render();
        assert_eq!(text, "CERT=\"line one\\nline \\\"two\\\"\"\nPLAIN=abc\n");
        assert_eq!(text.lines().count(), 2);

        let parsed = EnvFile::parse(&text);
        assert_eq!(parsed.get("CERT"), Some("line one\nline \"two\""));
        assert_eq!(parsed, env);
    }

    #[test]
    fn test_value_with_equals_sign() {
        let env = EnvFile::parse("SECRET_BOT_PASSWORD=crypto_abc==\n");
        assert_eq!(env.get("SECRET_BOT_PASSWORD"), Some("crypto_abc=="));
    }
}
