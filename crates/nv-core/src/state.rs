use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::character::{Character, DERIVED_KEYS, EQUIPMENT_SLOTS};
use crate::path::{self, Path, Segment};
use crate::value::{Map, Value, parse_finite};

/// The namespace a path starts in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    /// `character.<id>.…`
    Character(String),
    /// `global.…`
    Global,
}

/// A resolved write location: the concrete route to a container plus the
/// key inside it. Selectors such as `[sword]` are already turned into list
/// positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHandle {
    root: Root,
    container: Vec<Segment>,
    key: Segment,
}

impl PathHandle {
    /// Namespace of the handle.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Route from the namespace root to the containing value.
    pub fn container(&self) -> &[Segment] {
        &self.container
    }

    /// Key (or list position) inside the container.
    pub fn key(&self) -> &Segment {
        &self.key
    }

    fn touches_equipment(&self) -> bool {
        self.container
            .iter()
            .chain(std::iter::once(&self.key))
            .any(|s| matches!(s, Segment::Key(k) if k == EQUIPMENT_SLOTS))
    }
}

/// The state tree shared by the interpreter, the rule engine and the save
/// codec: per-character fields and a free-form global namespace.
///
/// Every mutation bumps [`StateTree::revision`], which hosts use to decide
/// whether rules need another evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct StateTree {
    characters: BTreeMap<String, Character>,
    global: Map,
    revision: u64,
}

impl StateTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark the tree as changed without writing anything.
    pub fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// All loaded characters, by id.
    pub fn characters(&self) -> &BTreeMap<String, Character> {
        &self.characters
    }

    /// Look up a loaded character.
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.get(id)
    }

    /// Mutable access to a character. Counts as a mutation.
    pub fn character_mut(&mut self, id: &str) -> Option<&mut Character> {
        let character = self.characters.get_mut(id)?;
        self.revision = self.revision.wrapping_add(1);
        Some(character)
    }

    /// Add or replace a character.
    pub fn insert_character(&mut self, character: Character) {
        self.touch();
        self.characters.insert(character.id().to_string(), character);
    }

    /// The global namespace.
    pub fn global(&self) -> &Map {
        &self.global
    }

    /// Replace the whole global namespace.
    pub fn set_global(&mut self, global: Map) {
        self.touch();
        self.global = global;
    }

    /// Drop all characters and global data.
    pub fn clear(&mut self) {
        self.touch();
        self.characters.clear();
        self.global.clear();
    }

    /// Read a path. Missing paths yield `None`; derived character data is
    /// readable here even though it cannot be written.
    pub fn read(&self, path: &str) -> Option<&Value> {
        let parsed = Path::parse(path)?;
        let (root, rest) = self.split_root(&parsed)?;
        match root {
            Root::Global => lookup_in_map(&self.global, rest),
            Root::Character(id) => {
                let character = self.characters.get(&id)?;
                match lookup_in_map(character.fields(), rest) {
                    Some(v) => Some(v),
                    None => match rest.first() {
                        Some(Segment::Key(k)) if DERIVED_KEYS.contains(&k.as_str()) => {
                            character.derived(k).and_then(|v| path::lookup(v, &rest[1..]))
                        }
                        _ => None,
                    },
                }
            }
        }
    }

    /// Read a path and clone the value.
    pub fn read_value(&self, path: &str) -> Option<Value> {
        self.read(path).cloned()
    }

    /// Resolve a path for writing, creating missing intermediate maps.
    /// Returns `None` (after logging a warning) when the root is unknown or
    /// the route runs through a non-container.
    pub fn resolve(&mut self, path: &str) -> Option<PathHandle> {
        let handle = self.resolve_inner(path);
        if handle.is_none() {
            tracing::warn!(path, "unresolved path");
        }
        handle
    }

    fn resolve_inner(&mut self, path: &str) -> Option<PathHandle> {
        let parsed = Path::parse(path)?;
        let (root, rest) = self.split_root(&parsed)?;
        let derived = matches!(
            (&root, rest.first()),
            (Root::Character(_), Some(Segment::Key(k))) if DERIVED_KEYS.contains(&k.as_str())
        );
        if derived {
            tracing::warn!(path, "derived character data is read-only");
            return None;
        }
        let rest = rest.to_vec();
        let map = self.root_map_mut(&root)?;
        let (container, key) = with_root(map, |value| create_route(value, &rest))?;
        Some(PathHandle {
            root,
            container,
            key,
        })
    }

    /// Read through a handle.
    pub fn get(&self, handle: &PathHandle) -> Option<&Value> {
        let map = match &handle.root {
            Root::Global => &self.global,
            Root::Character(id) => self.characters.get(id)?.fields(),
        };
        let mut route = handle.container.clone();
        route.push(handle.key.clone());
        lookup_in_map(map, &route)
    }

    /// Write through a handle. Returns whether the value was stored.
    pub fn set(&mut self, handle: &PathHandle, value: Value) -> bool {
        let Some(map) = self.root_map_mut(&handle.root) else {
            return false;
        };
        let stored = with_root(map, |root| {
            let Some(container) = walk_mut(root, &handle.container) else {
                return false;
            };
            store(container, &handle.key, value)
        });
        if !stored {
            return false;
        }
        self.touch();
        if let Root::Character(id) = &handle.root {
            let character = self.characters.get_mut(id);
            if let Some(character) = character.filter(|_| handle.touches_equipment()) {
                character.rebuild_equipment_index();
            }
        }
        true
    }

    /// Resolve and write in one go. Unresolved paths are a logged no-op.
    pub fn write(&mut self, path: &str, value: Value) -> bool {
        match self.resolve(path) {
            Some(handle) => self.set(&handle, value),
            None => false,
        }
    }

    /// Apply an assignment expression `<path> <op> <rhs>` with op one of
    /// `=`, `+=`, `-=`, `*=`, `/=`.
    ///
    /// The right-hand side is a number, a quoted string, another path, or
    /// else the raw text. Compound operators coerce non-numeric operands to
    /// 0; a zero or non-numeric divisor is treated as 1.
    pub fn apply_assignment(&mut self, expr: &str) -> bool {
        let Some((target, op, rhs)) = split_assignment(expr) else {
            tracing::warn!(expr, "unsupported assignment expression");
            return false;
        };
        let Some(handle) = self.resolve(target) else {
            return false;
        };

        let rhs_value = self.rhs_value(rhs);
        let new_value = if op == AssignOp::Set {
            rhs_value
        } else {
            let current = self
                .get(&handle)
                .and_then(Value::coerce_number)
                .unwrap_or(0.0);
            Value::from_number(op.apply(current, rhs_value.coerce_number()))
        };

        tracing::debug!(expr, value = %new_value, "applied assignment");
        self.set(&handle, new_value)
    }

    fn rhs_value(&self, rhs: &str) -> Value {
        if let Some(n) = parse_finite(rhs) {
            return Value::from_number(n);
        }
        if let Some(text) = unquote(rhs) {
            return Value::String(text.to_string());
        }
        match self.read(rhs) {
            Some(v) => v.clone(),
            None => Value::String(rhs.to_string()),
        }
    }

    fn split_root<'p>(&self, path: &'p Path) -> Option<(Root, &'p [Segment])> {
        match path.segments() {
            [Segment::Key(ns), Segment::Key(id), rest @ ..] if ns == "character" => {
                if rest.is_empty() || !self.characters.contains_key(id) {
                    return None;
                }
                Some((Root::Character(id.clone()), rest))
            }
            [Segment::Key(ns), rest @ ..] if ns == "global" && !rest.is_empty() => {
                Some((Root::Global, rest))
            }
            _ => None,
        }
    }

    fn root_map_mut(&mut self, root: &Root) -> Option<&mut Map> {
        match root {
            Root::Global => Some(&mut self.global),
            Root::Character(id) => self.characters.get_mut(id).map(Character::fields_mut),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    // The divisor fallback to 1 is a compatibility rule for existing content,
    // not a numeric policy. Keep it confined to `/=`.
    fn apply(self, current: f64, operand: Option<f64>) -> f64 {
        match self {
            Self::Set => operand.unwrap_or(0.0),
            Self::Add => current + operand.unwrap_or(0.0),
            Self::Sub => current - operand.unwrap_or(0.0),
            Self::Mul => current * operand.unwrap_or(0.0),
            Self::Div => current / operand.filter(|d| *d != 0.0).unwrap_or(1.0),
        }
    }
}

/// `<path> <op> <rhs>`, with `op` one of `=`, `+=`, `-=`, `*=`, `/=`.
static ASSIGNMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^\s*([\w.\[\]'"]+)\s*(\+=|-=|\*=|/=|=)\s*(\S.*?)\s*$"#).ok()
});

fn split_assignment(expr: &str) -> Option<(&str, AssignOp, &str)> {
    let caps = ASSIGNMENT.as_ref()?.captures(expr)?;
    let op = match caps.get(2)?.as_str() {
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        _ => AssignOp::Set,
    };
    Some((caps.get(1)?.as_str(), op, caps.get(3)?.as_str()))
}

fn unquote(s: &str) -> Option<&str> {
    if s.len() < 2 {
        return None;
    }
    let first = s.chars().next()?;
    let last = s.chars().last()?;
    if matches!(first, '"' | '\'') && matches!(last, '"' | '\'') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn lookup_in_map<'a>(map: &'a Map, segments: &[Segment]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let value = match first {
        Segment::Key(k) | Segment::Match(k) => map.get(k),
        Segment::Index(i) => map.get(&i.to_string()),
    }?;
    path::lookup(value, rest)
}

/// Run `f` with the map temporarily wrapped as a `Value`.
fn with_root<R>(map: &mut Map, f: impl FnOnce(&mut Value) -> R) -> R {
    let mut root = Value::Map(std::mem::take(map));
    let out = f(&mut root);
    if let Value::Map(m) = root {
        *map = m;
    }
    out
}

fn create_route(root: &mut Value, segments: &[Segment]) -> Option<(Vec<Segment>, Segment)> {
    let (last, intermediate) = segments.split_last()?;
    let mut route = Vec::with_capacity(intermediate.len());
    let mut current = root;
    for segment in intermediate {
        let (next, concrete) = descend_create(current, segment)?;
        route.push(concrete);
        current = next;
    }
    let key = concrete_key(current, last)?;
    Some((route, key))
}

fn descend_create<'a>(current: &'a mut Value, segment: &Segment) -> Option<(&'a mut Value, Segment)> {
    match (current, segment) {
        (Value::Map(m), Segment::Key(k) | Segment::Match(k)) => {
            let child = m.entry(k.clone()).or_insert_with(Value::map);
            if child.is_null() {
                *child = Value::map();
            }
            if !matches!(child, Value::Map(_) | Value::List(_)) {
                return None;
            }
            Some((child, Segment::Key(k.clone())))
        }
        (Value::Map(m), Segment::Index(i)) => {
            let key = i.to_string();
            let child = m.entry(key.clone()).or_insert_with(Value::map);
            if child.is_null() {
                *child = Value::map();
            }
            if !matches!(child, Value::Map(_) | Value::List(_)) {
                return None;
            }
            Some((child, Segment::Key(key)))
        }
        (Value::List(items), Segment::Index(i)) => {
            let child = items.get_mut(*i)?;
            matches!(child, Value::Map(_) | Value::List(_)).then_some((child, Segment::Index(*i)))
        }
        (Value::List(items), Segment::Match(id)) => {
            let i = path::position_of(items, id)?;
            let child = items.get_mut(i)?;
            matches!(child, Value::Map(_) | Value::List(_)).then_some((child, Segment::Index(i)))
        }
        _ => None,
    }
}

fn concrete_key(container: &Value, segment: &Segment) -> Option<Segment> {
    match (container, segment) {
        (Value::Map(_), Segment::Key(k) | Segment::Match(k)) => Some(Segment::Key(k.clone())),
        (Value::Map(_), Segment::Index(i)) => Some(Segment::Key(i.to_string())),
        (Value::List(items), Segment::Index(i)) => (*i <= items.len()).then_some(Segment::Index(*i)),
        (Value::List(items), Segment::Match(id)) => path::position_of(items, id).map(Segment::Index),
        _ => None,
    }
}

fn walk_mut<'a>(root: &'a mut Value, route: &[Segment]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in route {
        current = match (current, segment) {
            (Value::Map(m), Segment::Key(k)) => m.get_mut(k)?,
            (Value::List(items), Segment::Index(i)) => items.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

fn store(container: &mut Value, key: &Segment, value: Value) -> bool {
    match (container, key) {
        (Value::Map(m), Segment::Key(k)) => {
            m.insert(k.clone(), value);
            true
        }
        (Value::List(items), Segment::Index(i)) => {
            if let Some(slot) = items.get_mut(*i) {
                *slot = value;
                true
            } else if *i == items.len() {
                items.push(value);
                true
            } else {
                false
            }
        }
        _ => false,
    }
}
