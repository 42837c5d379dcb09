use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::{LedgerError, Result};
use crate::persist::write_atomic;
use crate::schema::{is_bank_code, AccountingRule, AccountType, GstTreatment};

const BLOCK_PREFIX: &str = "=== ACCOUNTING RULE: ";
const BLOCK_SUFFIX: &str = " ===";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Plaintext, block-structured store of categorization rules. The file is
/// the source of truth; blocks round-trip losslessly.
#[derive(Debug, Default)]
pub struct AccountingRulesStore {
    rules: Vec<AccountingRule>,
    path: Option<PathBuf>,
}

impl AccountingRulesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self {
            rules: Vec::new(),
            path: Some(path.to_path_buf()),
        };
        if !path.exists() {
            return Ok(store);
        }
        let raw = std::fs::read_to_string(path)?;
        store.rules = parse_rules(&raw);
        info!("loaded {} accounting rules from {}", store.rules.len(), path.display());
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.path.as_ref().ok_or_else(|| {
            LedgerError::Validation("rules store has no backing file".to_string())
        })?;
        write_atomic(path, &render_rules(&self.rules))
    }

    pub fn add(&mut self, rule: AccountingRule) -> Result<&AccountingRule> {
        validate_rule(&rule)?;
        if self.find(&rule.name).is_some() {
            return Err(LedgerError::Conflict(format!(
                "accounting rule '{}' already exists; use update_accounting_rule",
                rule.name
            )));
        }
        self.rules.push(rule);
        Ok(self.rules.last().expect("just pushed"))
    }

    /// Replaces a rule's mutable fields, keeping the original `created`
    /// timestamp and refreshing `updated`.
    pub fn update(
        &mut self,
        name: &str,
        priority: Option<u8>,
        condition: Option<String>,
        action: Option<String>,
        target: Option<(String, AccountType, GstTreatment)>,
        notes: Option<String>,
    ) -> Result<&AccountingRule> {
        let position = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| LedgerError::NotFound(format!("accounting rule '{}' not found", name)))?;
        let mut updated = self.rules[position].clone();
        if let Some(priority) = priority {
            updated.priority = priority;
        }
        if let Some(condition) = condition {
            updated.condition = condition;
        }
        if let Some(action) = action {
            updated.action = action;
        }
        if let Some((code, account_type, gst_handling)) = target {
            updated.account_code = code;
            updated.account_type = account_type;
            updated.gst_handling = gst_handling;
        }
        if let Some(notes) = notes {
            updated.notes = notes;
        }
        updated.updated = Utc::now();
        validate_rule(&updated)?;
        self.rules[position] = updated;
        Ok(&self.rules[position])
    }

    pub fn delete(&mut self, name: &str, confirm: bool) -> Result<AccountingRule> {
        if !confirm {
            return Err(LedgerError::Validation(format!(
                "deleting accounting rule '{}' requires confirm: true",
                name
            )));
        }
        let position = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| LedgerError::NotFound(format!("accounting rule '{}' not found", name)))?;
        Ok(self.rules.remove(position))
    }

    pub fn find(&self, name: &str) -> Option<&AccountingRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn list(
        &self,
        condition_filter: Option<&str>,
        target_account: Option<&str>,
        sort_by_priority: bool,
        limit: Option<usize>,
    ) -> Vec<&AccountingRule> {
        let mut out: Vec<&AccountingRule> = self
            .rules
            .iter()
            .filter(|r| match condition_filter {
                Some(f) => r.condition.to_lowercase().contains(&f.to_lowercase()),
                None => true,
            })
            .filter(|r| match target_account {
                Some(code) => r.account_code == code,
                None => true,
            })
            .collect();
        if sort_by_priority {
            out.sort_by_key(|r| r.priority);
        }
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    pub fn all(&self) -> &[AccountingRule] {
        &self.rules
    }

    /// The whole store in its on-disk form, as embedded by the company file.
    pub fn to_text(&self) -> String {
        render_rules(&self.rules)
    }

    pub fn replace_from_text(&mut self, text: &str) {
        self.rules = parse_rules(text);
    }
}

fn validate_rule(rule: &AccountingRule) -> Result<()> {
    if rule.name.trim().is_empty() {
        return Err(LedgerError::Validation("rule name must not be empty".to_string()));
    }
    if !(1..=10).contains(&rule.priority) {
        return Err(LedgerError::Validation(format!(
            "priority {} is out of range 1-10",
            rule.priority
        )));
    }
    if is_bank_code(&rule.account_code) {
        return Err(LedgerError::Protected(format!(
            "rules may not target account {} in the bank range 001-099",
            rule.account_code
        )));
    }
    Ok(())
}

fn render_rules(rules: &[AccountingRule]) -> String {
    let mut out = String::new();
    for rule in rules {
        out.push_str(BLOCK_PREFIX);
        out.push_str(&rule.name);
        out.push_str(BLOCK_SUFFIX);
        out.push('\n');
        out.push_str(&format!("Created: {}\n", rule.created.format(TIMESTAMP_FORMAT)));
        out.push_str(&format!("Updated: {}\n", rule.updated.format(TIMESTAMP_FORMAT)));
        out.push_str(&format!("Priority: {}\n", rule.priority));
        out.push_str(&format!("Condition: {}\n", rule.condition));
        out.push_str(&format!("Action: {}\n", rule.action));
        out.push_str(&format!("Account: {}\n", rule.account_code));
        out.push_str(&format!(
            "Account Type: {}\n",
            serde_plain_name(&rule.account_type)
        ));
        out.push_str(&format!(
            "GST Handling: {}\n",
            serde_plain_name(&rule.gst_handling)
        ));
        out.push_str(&format!("Notes: {}\n", rule.notes));
        out.push('\n');
    }
    out
}

fn serde_plain_name<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default()
}

fn parse_rules(text: &str) -> Vec<AccountingRule> {
    let mut rules = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut name: Option<String> = None;

    for line in text.lines().chain(std::iter::once("")) {
        if let Some(header) = line.strip_prefix(BLOCK_PREFIX).and_then(|r| r.strip_suffix(BLOCK_SUFFIX)) {
            if let Some(current) = name.take() {
                match parse_block(&current, &block) {
                    Some(rule) => rules.push(rule),
                    None => warn!("skipping malformed accounting rule block '{}'", current),
                }
            }
            block.clear();
            name = Some(header.to_string());
        } else if name.is_some() {
            block.push(line);
        }
    }
    if let Some(current) = name.take() {
        match parse_block(&current, &block) {
            Some(rule) => rules.push(rule),
            None => warn!("skipping malformed accounting rule block '{}'", current),
        }
    }
    rules
}

fn parse_block(name: &str, lines: &[&str]) -> Option<AccountingRule> {
    let field = |key: &str| -> Option<String> {
        let prefix = format!("{}: ", key);
        lines.iter().find_map(|l| l.strip_prefix(&prefix).map(|v| v.to_string()))
            .or_else(|| {
                // A field with an empty value renders as "Key:".
                let bare = format!("{}:", key);
                lines.iter().find_map(|l| (*l == bare).then(String::new))
            })
    };
    let parse_time = |value: &str| -> Option<DateTime<Utc>> {
        chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .ok()
            .map(|t| t.and_utc())
    };
    Some(AccountingRule {
        name: name.to_string(),
        created: parse_time(&field("Created")?)?,
        updated: parse_time(&field("Updated")?)?,
        priority: field("Priority")?.parse().ok()?,
        condition: field("Condition")?,
        action: field("Action")?,
        account_code: field("Account")?,
        account_type: serde_json::from_value(serde_json::Value::String(field("Account Type")?)).ok()?,
        gst_handling: serde_json::from_value(serde_json::Value::String(field("GST Handling")?)).ok()?,
        notes: field("Notes").unwrap_or_default(),
    })
}
