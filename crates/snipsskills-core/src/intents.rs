//! 意图类生成：根据助手包中的意图定义生成技能可直接导入的 Python 类。
//!
//! 输出（位于 `.snips/intents`）：
//! - 每个意图一个模块：`<snake_name>_intent.py`，内含 `<CamelName>Intent` 类
//! - `__init__.py`：汇总导入全部意图类
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bundle::{AssistantBundle, IntentDefinition};
use crate::download::save;

/// 删除上一次生成的输出（尽力而为）。
///
/// 目录可能尚不存在；删除失败（包括权限错误）一律忽略。
pub fn clear(output_dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(output_dir) {
        debug!("忽略清理失败 {}: {}", output_dir.display(), e);
    }
}

/// 为助手包中的全部意图生成 Python 类文件。
///
/// 返回值：
/// - 生成的文件路径列表（含 `__init__.py`，位于最后）
///
/// 异常处理：
/// - 创建目录或写文件失败返回错误
pub fn generate(bundle: &AssistantBundle, output_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut init = String::from("# -*-: coding utf-8 -*-\n\"\"\" Auto-generated intent classes. \"\"\"\n\n");
    let mut taken = HashSet::new();

    for intent in &bundle.definition().intents {
        // `turnOn` 与 `turn_on` 会得到同一个模块名，后来者加序号。
        let suffix = unique_suffix(&module_name(&intent.name), &mut taken);
        let module = format!("{}{}", module_name(&intent.name), suffix);
        let class = format!("{}{}", class_name(&intent.name), suffix);
        let path = save(render_class(intent, &class).as_bytes(), output_dir, &format!("{module}.py"))?;
        let _ = writeln!(init, "from .{module} import {class}");
        written.push(path);
    }

    written.push(save(init.as_bytes(), output_dir, "__init__.py")?);
    Ok(written)
}

/// 渲染单个意图的 Python 模块源码。
pub fn render_intent(intent: &IntentDefinition) -> String {
    render_class(intent, &class_name(&intent.name))
}

fn render_class(intent: &IntentDefinition, class: &str) -> String {
    let mut taken = HashSet::new();
    let slots: Vec<String> = intent
        .slots
        .iter()
        .map(|s| {
            let ident = identifier(&s.name);
            let suffix = unique_suffix(&ident, &mut taken);
            format!("{ident}{suffix}")
        })
        .collect();

    let mut out = String::new();
    out.push_str("# -*-: coding utf-8 -*-\n");
    let _ = writeln!(
        out,
        "\"\"\" Auto-generated intent class for `{}`. \"\"\"\n\n",
        py_escape(&intent.name)
    );
    let _ = writeln!(out, "class {class}(object):\n");
    let _ = writeln!(out, "    intentName = \"{}\"", py_escape(&intent.name));
    let quoted: Vec<String> = intent
        .slots
        .iter()
        .map(|s| format!("\"{}\"", py_escape(&s.name)))
        .collect();
    let _ = writeln!(out, "    slotNames = [{}]\n", quoted.join(", "));
    out.push_str("    def __init__(self, slots=None):\n");
    out.push_str("        slots = slots or {}\n");
    if slots.is_empty() {
        out.push_str("        self.slots = slots\n");
    }
    for (slot, ident) in intent.slots.iter().zip(&slots) {
        let _ = writeln!(
            out,
            "        self.{} = slots.get(\"{}\")",
            ident,
            py_escape(&slot.name)
        );
    }
    out
}

/// 首次出现返回空串，重复出现返回 `_2`、`_3` …
fn unique_suffix(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return String::new();
    }
    let mut n = 2;
    loop {
        let suffix = format!("_{n}");
        if taken.insert(format!("{name}{suffix}")) {
            return suffix;
        }
        n += 1;
    }
}

/// 转义为 Python 双引号字符串内容（也可安全放进 `"""` 文档字符串）。
fn py_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

fn words(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in raw.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `turnOnLight` → `TurnOnLightIntent`。
pub fn class_name(intent: &str) -> String {
    let mut name: String = words(intent)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "Generated");
    }
    name.push_str("Intent");
    name
}

/// `turnOnLight` → `turn_on_light_intent`。
pub fn module_name(intent: &str) -> String {
    format!("{}_intent", snake(intent))
}

/// 任意名称 → 合法的 Python 标识符（snake_case；关键字后加 `_`）。
pub fn identifier(raw: &str) -> String {
    let mut ident = snake(raw);
    if PYTHON_KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

fn snake(raw: &str) -> String {
    let mut ident = words(raw)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert_str(0, "slot_");
    }
    ident
}

const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "exec", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or",
    "pass", "print", "raise", "return", "try", "while", "with", "yield",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::write_zip;
    use crate::bundle::SlotDefinition;

    #[test]
    fn names() {
        assert_eq!(class_name("turnOnLight"), "TurnOnLightIntent");
        assert_eq!(class_name("user_abc__setTimer"), "UserAbcSetTimerIntent");
        assert_eq!(class_name("42answers"), "Generated42answersIntent");
        assert_eq!(module_name("turnOnLight"), "turn_on_light_intent");
        assert_eq!(module_name("snips:playMusic"), "snips_play_music_intent");
        assert_eq!(identifier("room name"), "room_name");
        assert_eq!(identifier("1st"), "slot_1st");
        assert_eq!(identifier("lambda"), "lambda_");
        assert_eq!(module_name("class"), "class_intent");
    }

    #[test]
    fn render_contains_slots() {
        let intent = IntentDefinition {
            name: "turnOn".into(),
            slots: vec![SlotDefinition {
                name: "roomName".into(),
                entity: None,
            }],
        };
        let src = render_intent(&intent);
        assert!(src.contains("class TurnOnIntent(object):"));
        assert!(src.contains("intentName = \"turnOn\""));
        assert!(src.contains("slotNames = [\"roomName\"]"));
        assert!(src.contains("self.room_name = slots.get(\"roomName\")"));
    }

    #[test]
    fn keyword_slots_and_quotes_stay_valid_python() {
        let intent = IntentDefinition {
            name: r#"say\"""hi"#.into(),
            slots: vec![
                SlotDefinition {
                    name: "class".into(),
                    entity: None,
                },
                SlotDefinition {
                    name: "from".into(),
                    entity: None,
                },
                SlotDefinition {
                    name: "roomName".into(),
                    entity: None,
                },
                SlotDefinition {
                    name: "room_name".into(),
                    entity: None,
                },
            ],
        };
        let src = render_intent(&intent);
        assert!(src.contains("self.class_ = slots.get(\"class\")"), "{src}");
        assert!(src.contains("self.from_ = slots.get(\"from\")"), "{src}");
        assert!(src.contains("self.room_name = slots.get(\"roomName\")"), "{src}");
        assert!(src.contains("self.room_name_2 = slots.get(\"room_name\")"), "{src}");
        assert!(src.contains(r#"intentName = "say\\\"\"\"hi""#), "{src}");
        assert!(!src.contains(r#"say\""""#), "{src}");
    }

    #[test]
    fn colliding_intent_names_get_distinct_modules() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("assistant.zip");
        write_zip(
            &zip,
            &[("assistant.json", r#"{"intents":[{"name":"turnOn"},{"name":"turn_on"}]}"#)],
        );
        let bundle = AssistantBundle::open(&zip).unwrap();
        let out = dir.path().join("intents");

        let files = generate(&bundle, &out).unwrap();
        assert_eq!(files.len(), 3);
        let first = std::fs::read_to_string(out.join("turn_on_intent.py")).unwrap();
        let second = std::fs::read_to_string(out.join("turn_on_intent_2.py")).unwrap();
        assert!(first.contains("intentName = \"turnOn\""));
        assert!(second.contains("class TurnOnIntent_2(object):"));
        assert!(second.contains("intentName = \"turn_on\""));
        let init = std::fs::read_to_string(out.join("__init__.py")).unwrap();
        assert!(init.contains("from .turn_on_intent import TurnOnIntent\n"));
        assert!(init.contains("from .turn_on_intent_2 import TurnOnIntent_2\n"));
    }

    #[test]
    fn generate_then_clear() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("assistant.zip");
        write_zip(
            &zip,
            &[(
                "assistant.json",
                r#"{"intents":[{"name":"turnOn"},{"name":"turnOff","slots":[{"name":"room"}]}]}"#,
            )],
        );
        let bundle = AssistantBundle::open(&zip).unwrap();
        let out = dir.path().join(".snips").join("intents");

        let files = generate(&bundle, &out).unwrap();
        assert_eq!(files.len(), 3);
        assert!(out.join("turn_on_intent.py").is_file());
        assert!(out.join("turn_off_intent.py").is_file());
        let init = std::fs::read_to_string(out.join("__init__.py")).unwrap();
        assert!(init.contains("from .turn_on_intent import TurnOnIntent"));
        assert!(init.contains("from .turn_off_intent import TurnOffIntent"));

        clear(&out);
        assert!(!out.exists());
        clear(&out);
    }
}
