use std::fmt;

use crate::value::Value;

/// One step of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A map key (`name` in `global.name`).
    Key(String),
    /// A list position (`[3]`).
    Index(usize),
    /// A list element selected by its `id`, `itemId` or `item_id` field
    /// (`[sword]`). On a map this is a plain key lookup.
    Match(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{k}"),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Match(id) => write!(f, "[{id}]"),
        }
    }
}

/// A parsed dotted path such as `character.mc.items[sword].count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    raw: String,
    segments: Vec<Segment>,
}

impl Path {
    /// Parse a dotted path. Returns `None` for empty segments or unbalanced
    /// brackets.
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return None;
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            parse_part(part, &mut segments)?;
        }
        Some(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The text this path was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The leading plain key, if the path starts with one.
    pub fn root_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Whether any segment is the map key `key`.
    pub fn touches(&self, key: &str) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Key(k) if k == key))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn parse_part(part: &str, out: &mut Vec<Segment>) -> Option<()> {
    let part = part.trim();
    let (key, mut rest) = match part.find('[') {
        Some(pos) => part.split_at(pos),
        None => (part, ""),
    };
    if key.is_empty() || key.contains(']') {
        return None;
    }
    out.push(Segment::Key(key.to_string()));

    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let selector = inner[..close].trim();
        if selector.is_empty() {
            return None;
        }
        out.push(parse_selector(selector));
        rest = &inner[close + 1..];
    }
    Some(())
}

fn parse_selector(selector: &str) -> Segment {
    if let Ok(index) = selector.parse::<usize>() {
        return Segment::Index(index);
    }
    let unquoted = selector
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            selector
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(selector);
    Segment::Match(unquoted.to_string())
}

/// Walk `segments` from `root` without creating anything.
pub fn lookup<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| step(current, segment))
}

/// Resolve one segment against a value for reading.
pub(crate) fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Map(m), Segment::Key(k) | Segment::Match(k)) => m.get(k),
        (Value::Map(m), Segment::Index(i)) => m.get(&i.to_string()),
        (Value::List(items), Segment::Index(i)) => items.get(*i),
        (Value::List(items), Segment::Match(id)) => position_of(items, id).map(|i| &items[i]),
        _ => None,
    }
}

/// Position of the list element whose discriminator equals `id`.
pub(crate) fn position_of(items: &[Value], id: &str) -> Option<usize> {
    items
        .iter()
        .position(|item| item.discriminator().as_deref() == Some(id))
}
