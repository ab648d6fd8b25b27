//! Dotted-path access into `serde_json::Value` trees, the only way this
//! crate ever reaches into a payload body (no field is read positionally
//! or by index beyond `[n]` array access).

use serde_json::Value;

/// Split `a.b[0].c` into segments `["a", "b", "[0]", "c"]`-ish tokens,
/// consumed by [`get`]/[`set`].
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn segments(path: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    for dot_part in path.split('.') {
        let mut rest = dot_part;
        loop {
            match rest.find('[') {
                None => {
                    if !rest.is_empty() {
                        out.push(Segment::Key(rest));
                    }
                    break;
                }
                Some(open) => {
                    let key = &rest[..open];
                    if !key.is_empty() {
                        out.push(Segment::Key(key));
                    }
                    let close = match rest[open..].find(']') {
                        Some(c) => open + c,
                        None => {
                            out.push(Segment::Key(&rest[open..]));
                            break;
                        }
                    };
                    if let Ok(idx) = rest[open + 1..close].parse::<usize>() {
                        out.push(Segment::Index(idx));
                    }
                    rest = &rest[close + 1..];
                }
            }
        }
    }
    out
}

/// Read a value at `path`, returning `None` if any segment is absent.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for seg in segments(path) {
        current = match seg {
            Segment::Key(k) => current.get(k)?,
            Segment::Index(i) => current.get(i)?,
        };
    }
    Some(current)
}

/// Write a value at `path`, creating intermediate objects/arrays as needed.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let segs = segments(path);
    let mut current = root;
    for (i, seg) in segs.iter().enumerate() {
        let last = i == segs.len() - 1;
        match seg {
            Segment::Key(k) => {
                if !current.is_object() {
                    *current = Value::Object(serde_json::Map::new());
                }
                let map = current.as_object_mut().expect("forced above");
                if last {
                    map.insert((*k).to_string(), value);
                    return;
                }
                current = map.entry((*k).to_string()).or_insert(Value::Null);
            }
            Segment::Index(idx) => {
                if !current.is_array() {
                    *current = Value::Array(Vec::new());
                }
                let arr = current.as_array_mut().expect("forced above");
                while arr.len() <= *idx {
                    arr.push(Value::Null);
                }
                if last {
                    arr[*idx] = value;
                    return;
                }
                current = &mut arr[*idx];
            }
        }
    }
}
