//! Template-driven router driver
//!
//! [`TemplateHandler`] runs a [`VendorProfile`]: it tries the profile's
//! login dialects in order, remembers which one worked and then encodes
//! rules with that dialect's apply template.

use crate::router::templates::{
    ApplyCheck, ApplyTemplate, Dialect, FieldValue, LoginCheck, LoginMethod, LoginTemplate,
    RuleEncoding, TokenSource, TokenUse, VendorProfile,
};
use crate::router::transport::{RouterResponse, RouterTransport, TransportError};
use crate::router::{ApplyFailure, ApplyResult, AuthResult, Credentials, RouterCapability};
use crate::rules::{PortRule, RuleSet};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Method, RequestBuilder};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Logged-in state: the dialect that accepted the credentials and its token
#[derive(Clone)]
struct ActiveSession {
    dialect: &'static Dialect,
    token: Option<String>,
    credentials: Credentials,
}

impl ActiveSession {
    fn token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }
}

enum LoginAttempt {
    Accepted { token: Option<String> },
    Rejected { status: u16 },
}

/// [`RouterCapability`] executing a vendor profile
pub struct TemplateHandler {
    profile: &'static VendorProfile,
    transport: RouterTransport,
    session: Option<ActiveSession>,
    ledger: HashSet<(PortRule, Ipv4Addr)>,
}

impl TemplateHandler {
    /// Driver for `profile` talking through `transport`
    pub fn new(profile: &'static VendorProfile, transport: RouterTransport) -> Self {
        Self {
            profile,
            transport,
            session: None,
            ledger: HashSet::new(),
        }
    }

    /// Name of the dialect the last successful login used
    pub(crate) fn active_dialect(&self) -> Option<&'static str> {
        self.session.as_ref().map(|session| session.dialect.name)
    }

    async fn try_login(
        &self,
        login: &LoginTemplate,
        credentials: &Credentials,
    ) -> Result<LoginAttempt, TransportError> {
        let nonce = match login.method {
            LoginMethod::NonceJson { nonce_path } => {
                let response = self
                    .transport
                    .execute(self.transport.request(Method::GET, login.scheme, nonce_path))
                    .await?;
                match response.json().as_ref().and_then(|json| json_text(json, "nonce")) {
                    Some(nonce) => Some(nonce),
                    None => {
                        debug!("No nonce in response from {}", nonce_path);
                        return Ok(LoginAttempt::Rejected {
                            status: response.status,
                        });
                    }
                }
            }
            _ => None,
        };

        let password = login.password.encode(credentials.password(), nonce.as_deref());
        let request = self.transport.request(
            if login.method == LoginMethod::BasicProbe {
                Method::GET
            } else {
                Method::POST
            },
            login.scheme,
            login.path,
        );

        let request = match login.method {
            LoginMethod::Form => {
                let mut form = vec![
                    (login.username_field.to_string(), credentials.username().to_string()),
                    (login.password_field.to_string(), password),
                ];
                form.extend(login.extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
                request.form(&form)
            }
            LoginMethod::Json | LoginMethod::NonceJson { .. } => {
                let mut body = Map::new();
                body.insert(login.username_field.into(), credentials.username().into());
                body.insert(login.password_field.into(), password.into());
                if let Some(nonce) = &nonce {
                    body.insert("nonce".into(), nonce.clone().into());
                }
                for (key, value) in login.extra {
                    body.insert((*key).into(), (*value).into());
                }
                request.json(&Value::Object(body))
            }
            LoginMethod::Soap {
                action,
                soap_action,
                session_id,
            } => {
                let fields = vec![
                    (login.username_field.to_string(), credentials.username().to_string()),
                    (login.password_field.to_string(), password),
                ];
                request
                    .header(CONTENT_TYPE, "text/xml")
                    .header("SOAPAction", soap_action)
                    .body(soap_envelope(session_id, action, &fields))
            }
            LoginMethod::BasicProbe => {
                request.basic_auth(credentials.username(), Some(credentials.password()))
            }
        };

        let response = self.transport.execute(request).await?;
        let token = extract_token(login.token, &response);

        let accepted = match login.check {
            LoginCheck::TokenPresent => token.is_some(),
            LoginCheck::Status200 => response.is_ok(),
            LoginCheck::BodyContains(marker) => response.is_ok() && response.body.contains(marker),
        };

        if accepted {
            Ok(LoginAttempt::Accepted { token })
        } else {
            Ok(LoginAttempt::Rejected {
                status: response.status,
            })
        }
    }

    /// Request for `apply` with the session's token attached
    fn apply_request(&self, session: &ActiveSession, apply: &ApplyTemplate) -> RequestBuilder {
        let path = match apply.token {
            TokenUse::PathPlaceholder => apply.path.replace("{token}", session.token()),
            _ => apply.path.to_string(),
        };
        let request = self.transport.request(Method::POST, apply.scheme, &path);

        match apply.token {
            TokenUse::Cookie(name) => {
                request.header(COOKIE, format!("{}={}", name, session.token()))
            }
            TokenUse::Header(name) => request.header(name, session.token()),
            TokenUse::Bearer => request.bearer_auth(session.token()),
            TokenUse::Basic => request.basic_auth(
                session.credentials.username(),
                Some(session.credentials.password()),
            ),
            TokenUse::PathPlaceholder | TokenUse::SoapSession => request,
        }
    }

    /// Request carrying a single rule
    fn rule_request(
        &self,
        session: &ActiveSession,
        apply: &ApplyTemplate,
        rule: &PortRule,
        target: Ipv4Addr,
    ) -> RequestBuilder {
        let request = self.apply_request(session, apply);
        match apply.encoding {
            RuleEncoding::Json => {
                let body: Map<String, Value> = apply
                    .fields
                    .iter()
                    .map(|(key, value)| (key.to_string(), field_json(*value, rule, target)))
                    .collect();
                request.json(&Value::Object(body))
            }
            RuleEncoding::Soap { action } => {
                request
                    .header(CONTENT_TYPE, "text/xml")
                    .body(soap_envelope(session.token(), action, &text_fields(apply, rule, target)))
            }
            _ => request.form(&text_fields(apply, rule, target)),
        }
    }

    /// Request carrying the whole rule set at once
    fn batch_request(
        &self,
        session: &ActiveSession,
        apply: &ApplyTemplate,
        rules: &[PortRule],
        target: Ipv4Addr,
    ) -> RequestBuilder {
        let mut form: Vec<(String, String)> = Vec::new();

        if let RuleEncoding::LegacyLines { field } = apply.encoding {
            let lines: String = rules
                .iter()
                .map(|rule| {
                    format!(
                        "{ext} {ext} {proto} {target} Enabled {label},",
                        ext = rule.external_port,
                        proto = rule.protocol,
                        label = rule.label()
                    )
                })
                .collect();
            form.push((field.to_string(), lines));
        }

        for (key, value) in apply.fields.iter().filter(|(key, _)| !key.contains("{i}")) {
            if let Some(first) = rules.first() {
                form.push((key.to_string(), field_text(*value, first, target)));
            }
        }
        for (index, rule) in rules.iter().enumerate() {
            for (key, value) in apply.fields.iter().filter(|(key, _)| key.contains("{i}")) {
                form.push((
                    key.replace("{i}", &index.to_string()),
                    field_text(*value, rule, target),
                ));
            }
        }

        self.apply_request(session, apply).form(&form)
    }

    fn accepted(&self, check: ApplyCheck, response: &RouterResponse) -> bool {
        match check {
            ApplyCheck::Status200 => {
                if response.is_ok() {
                    debug!("{} answered 200; treating as applied", self.profile.tag);
                }
                response.is_ok()
            }
            ApplyCheck::BodyContains(marker) => response.is_ok() && response.body.contains(marker),
        }
    }

    async fn apply_each(
        &mut self,
        session: &ActiveSession,
        target: Ipv4Addr,
        rules: &RuleSet,
        cancel: &CancellationToken,
    ) -> ApplyResult {
        let apply = &session.dialect.apply;
        let mut applied = Vec::new();

        for rule in rules {
            if cancel.is_cancelled() {
                info!("Rule application cancelled after {} rules", applied.len());
                return ApplyResult::cancelled(applied);
            }

            if self.ledger.contains(&(*rule, target)) {
                debug!("{} already applied, skipping", rule.label());
                applied.push(*rule);
                continue;
            }

            let request = self.rule_request(session, apply, rule, target);
            match self.transport.execute(request).await {
                Ok(response) if self.accepted(apply.check, &response) => {
                    info!("Applied {} -> {}", rule, target);
                    self.ledger.insert((*rule, target));
                    applied.push(*rule);
                }
                Ok(response) => {
                    warn!("{} rejected {} with status {}", self.profile.tag, rule, response.status);
                    return ApplyResult::failed(
                        applied,
                        *rule,
                        ApplyFailure::Rejected {
                            status: response.status,
                        },
                    );
                }
                Err(e) => {
                    warn!("Failed to apply {}: {}", rule, e);
                    return ApplyResult::failed(applied, *rule, e);
                }
            }
        }

        ApplyResult::complete(applied)
    }

    async fn apply_batch(
        &mut self,
        session: &ActiveSession,
        target: Ipv4Addr,
        rules: &RuleSet,
        cancel: &CancellationToken,
    ) -> ApplyResult {
        let apply = &session.dialect.apply;
        let Some(first) = rules.iter().next().copied() else {
            return ApplyResult::complete(Vec::new());
        };

        if rules.iter().all(|rule| self.ledger.contains(&(*rule, target))) {
            debug!("Rule table already applied, skipping");
            return ApplyResult::complete(rules.rules().to_vec());
        }
        if cancel.is_cancelled() {
            return ApplyResult::cancelled(Vec::new());
        }

        // The batch replaces the whole table, so it always carries every rule
        let request = self.batch_request(session, apply, rules.rules(), target);
        match self.transport.execute(request).await {
            Ok(response) if self.accepted(apply.check, &response) => {
                info!("Applied {} rules -> {} in one request", rules.len(), target);
                self.ledger.extend(rules.iter().map(|rule| (*rule, target)));
                ApplyResult::complete(rules.rules().to_vec())
            }
            Ok(response) => {
                warn!("{} rejected the rule table with status {}", self.profile.tag, response.status);
                ApplyResult::failed(
                    Vec::new(),
                    first,
                    ApplyFailure::Rejected {
                        status: response.status,
                    },
                )
            }
            Err(e) => {
                warn!("Failed to apply rule table: {}", e);
                ApplyResult::failed(Vec::new(), first, e)
            }
        }
    }
}

#[async_trait]
impl RouterCapability for TemplateHandler {
    fn vendor(&self) -> &str {
        self.profile.tag
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> AuthResult {
        self.session = None;
        if let Err(e) = self.transport.reset() {
            return AuthResult::Unreachable(e);
        }

        let mut last_status = None;
        let mut last_error = None;

        for dialect in self.profile.dialects {
            debug!("Trying {} login ({})", self.profile.tag, dialect.name);
            match self.try_login(&dialect.login, credentials).await {
                Ok(LoginAttempt::Accepted { token }) => {
                    info!("Logged in to {} router ({})", self.profile.tag, dialect.name);
                    self.session = Some(ActiveSession {
                        dialect,
                        token,
                        credentials: credentials.clone(),
                    });
                    return AuthResult::Authenticated {
                        method: format!("{} {}", self.profile.tag, dialect.name),
                    };
                }
                Ok(LoginAttempt::Rejected { status }) => {
                    debug!("{} login rejected with status {}", dialect.name, status);
                    last_status = Some(status);
                }
                Err(e) => {
                    debug!("{} login failed: {}", dialect.name, e);
                    last_error = Some(e);
                }
            }
        }

        match (last_status, last_error) {
            (None, Some(e)) => AuthResult::Unreachable(e),
            (status, _) => AuthResult::Rejected {
                last_status: status,
            },
        }
    }

    async fn apply_rules(
        &mut self,
        target: Ipv4Addr,
        rules: &RuleSet,
        cancel: &CancellationToken,
    ) -> ApplyResult {
        let Some(session) = self.session.clone() else {
            return match rules.iter().next() {
                Some(rule) => ApplyResult::failed(Vec::new(), *rule, ApplyFailure::NotAuthenticated),
                None => ApplyResult::complete(Vec::new()),
            };
        };

        debug!(
            "Applying {} rules via the {} dialect",
            rules.len(),
            self.active_dialect().unwrap_or("unknown")
        );
        match session.dialect.apply.encoding {
            RuleEncoding::BatchForm | RuleEncoding::LegacyLines { .. } => {
                self.apply_batch(&session, target, rules, cancel).await
            }
            RuleEncoding::Form | RuleEncoding::Json | RuleEncoding::Soap { .. } => {
                self.apply_each(&session, target, rules, cancel).await
            }
        }
    }
}

fn extract_token(source: TokenSource, response: &RouterResponse) -> Option<String> {
    let token = match source {
        TokenSource::None => None,
        TokenSource::Cookie(name) => response.cookie(name),
        TokenSource::Header(name) => response.header(name).map(str::to_string),
        TokenSource::JsonField(path) => response.json().and_then(|json| json_text(&json, path)),
        TokenSource::SoapElement(name) => xml_element(&response.body, name),
    };
    token.filter(|token| !token.is_empty())
}

/// String (or number) at dotted `path` in `json`
fn json_text(json: &Value, path: &str) -> Option<String> {
    let value = path
        .split('.')
        .try_fold(json, |value, key| value.get(key))?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Text between `<name>` and `</name>`
fn xml_element(body: &str, name: &str) -> Option<String> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim().to_string())
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn soap_envelope(session_id: &str, action: &str, fields: &[(String, String)]) -> String {
    let body: String = fields
        .iter()
        .map(|(key, value)| format!("<{0}>{1}</{0}>", key, xml_escape(value)))
        .collect();

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>"#,
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="{ns}">"#,
            "<SOAP-ENV:Header><SessionID>{session}</SessionID></SOAP-ENV:Header>",
            "<SOAP-ENV:Body><{action}>{body}</{action}></SOAP-ENV:Body>",
            "</SOAP-ENV:Envelope>"
        ),
        ns = SOAP_ENVELOPE_NS,
        session = xml_escape(session_id),
        action = action,
        body = body
    )
}

fn field_text(value: FieldValue, rule: &PortRule, target: Ipv4Addr) -> String {
    match value {
        FieldValue::Label => rule.label(),
        FieldValue::Proto => rule.protocol.as_str().to_string(),
        FieldValue::ProtoLower => rule.protocol.as_lower().to_string(),
        FieldValue::ExtPort => rule.external_port.to_string(),
        FieldValue::IntPort => rule.internal_port.to_string(),
        FieldValue::TargetIp => target.to_string(),
        FieldValue::Text(text) => text.to_string(),
        FieldValue::Bool(flag) => String::from(if flag { "1" } else { "0" }),
        FieldValue::Int(n) => n.to_string(),
    }
}

fn field_json(value: FieldValue, rule: &PortRule, target: Ipv4Addr) -> Value {
    match value {
        FieldValue::Bool(flag) => Value::Bool(flag),
        FieldValue::Int(n) => Value::from(n),
        other => Value::String(field_text(other, rule, target)),
    }
}

fn text_fields(apply: &ApplyTemplate, rule: &PortRule, target: Ipv4Addr) -> Vec<(String, String)> {
    apply
        .fields
        .iter()
        .map(|(key, value)| (key.to_string(), field_text(*value, rule, target)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Protocol;

    #[test]
    fn test_json_text_follows_dotted_path() {
        let json: Value = serde_json::json!({"data": {"stok": "abc123"}, "code": 0});
        assert_eq!(json_text(&json, "data.stok").as_deref(), Some("abc123"));
        assert_eq!(json_text(&json, "code").as_deref(), Some("0"));
        assert!(json_text(&json, "data.missing").is_none());
    }

    #[test]
    fn test_xml_element() {
        let body = "<Envelope><SessionID> 42AB </SessionID></Envelope>";
        assert_eq!(xml_element(body, "SessionID").as_deref(), Some("42AB"));
        assert!(xml_element(body, "Token").is_none());
    }

    #[test]
    fn test_soap_envelope_escapes_values() {
        let fields = vec![("Password".to_string(), "a<b&c".to_string())];
        let envelope = soap_envelope("S1", "Authenticate", &fields);
        assert!(envelope.contains("<SessionID>S1</SessionID>"));
        assert!(envelope.contains("<Authenticate><Password>a&lt;b&amp;c</Password></Authenticate>"));
    }

    #[test]
    fn test_field_rendering() {
        let rule = PortRule::new(Protocol::Udp, 20001, 20011);
        let target = Ipv4Addr::new(192, 168, 1, 98);
        assert_eq!(field_text(FieldValue::Label, &rule, target), "RetroFwd_UDP_20001");
        assert_eq!(field_text(FieldValue::ProtoLower, &rule, target), "udp");
        assert_eq!(field_text(FieldValue::IntPort, &rule, target), "20011");
        assert_eq!(field_json(FieldValue::Bool(true), &rule, target), Value::Bool(true));
        assert_eq!(field_json(FieldValue::ExtPort, &rule, target), Value::from("20001"));
    }
}
