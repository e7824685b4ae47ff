//! Vendor dialect tables
//!
//! Every supported router family is described as data. A [`VendorProfile`]
//! lists one or more [`Dialect`]s (firmware generations); each dialect pairs
//! a [`LoginTemplate`] with the [`ApplyTemplate`] that only works with that
//! login's token.

use crate::router::encoding::PasswordEncoding;
use crate::router::encoding::PasswordEncoding::{Base64, Md5Hex, Plain, Sha1NonceHex, Sha256Hex};
use crate::router::transport::Scheme;
use crate::router::transport::Scheme::{Http, Https};
use FieldValue as F;

/// How credentials are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    /// `application/x-www-form-urlencoded` POST
    Form,
    /// JSON object POST
    Json,
    /// SOAP envelope POST
    Soap {
        /// Body element wrapping the credentials
        action: &'static str,
        /// `SOAPAction` header
        soap_action: &'static str,
        /// Session id placed in the envelope header before login
        session_id: &'static str,
    },
    /// GET with HTTP Basic credentials; the connection stays authenticated
    BasicProbe,
    /// GET a nonce, then JSON POST with the nonce-salted password
    NonceJson {
        /// Path returning `{"nonce": ...}`
        nonce_path: &'static str,
    },
}

/// Where the session token comes from in the login response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// No token; authentication is per request
    None,
    /// Value of a `Set-Cookie` cookie
    Cookie(&'static str),
    /// Raw value of a response header
    Header(&'static str),
    /// JSON field, dotted path (`data.stok`)
    JsonField(&'static str),
    /// Text of an XML element
    SoapElement(&'static str),
}

/// What counts as a successful login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginCheck {
    /// A non-empty token was extracted
    TokenPresent,
    /// HTTP 200
    Status200,
    /// HTTP 200 and the body contains the marker
    BodyContains(&'static str),
}

/// Login request description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTemplate {
    /// URL scheme
    pub scheme: Scheme,
    /// Request path
    pub path: &'static str,
    /// Transport of the credentials
    pub method: LoginMethod,
    /// Field carrying the user name
    pub username_field: &'static str,
    /// Field carrying the (encoded) password
    pub password_field: &'static str,
    /// Password encoding
    pub password: PasswordEncoding,
    /// Constant extra fields
    pub extra: &'static [(&'static str, &'static str)],
    /// Token location
    pub token: TokenSource,
    /// Success condition
    pub check: LoginCheck,
}

/// Value of one rule field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// Deterministic rule label
    Label,
    /// `TCP` / `UDP`
    Proto,
    /// `tcp` / `udp`
    ProtoLower,
    /// External port
    ExtPort,
    /// Internal port
    IntPort,
    /// Forwarding target address
    TargetIp,
    /// Constant string
    Text(&'static str),
    /// Constant JSON boolean (`"1"`/`"0"` in forms)
    Bool(bool),
    /// Constant JSON integer
    Int(i64),
}

/// Shape of the rule-application request(s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEncoding {
    /// One form POST per rule
    Form,
    /// One JSON POST per rule
    Json,
    /// One SOAP envelope per rule
    Soap {
        /// Body element wrapping the rule fields
        action: &'static str,
    },
    /// One form POST for the whole set; keys containing `{i}` repeat per rule
    BatchForm,
    /// One form POST carrying every rule as a comma-terminated line list
    LegacyLines {
        /// Field holding the list
        field: &'static str,
    },
}

/// How the login token is presented on apply requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    /// `Cookie: <name>=<token>`
    Cookie(&'static str),
    /// `<name>: <token>`
    Header(&'static str),
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `{token}` in the apply path
    PathPlaceholder,
    /// `<SessionID>` in the SOAP header
    SoapSession,
    /// HTTP Basic with the login credentials
    Basic,
}

/// What counts as an accepted rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyCheck {
    /// HTTP 200
    Status200,
    /// HTTP 200 and the body contains the marker
    BodyContains(&'static str),
}

/// Rule-application request description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyTemplate {
    /// URL scheme
    pub scheme: Scheme,
    /// Request path, may contain `{token}`
    pub path: &'static str,
    /// Request shape
    pub encoding: RuleEncoding,
    /// Field names and values
    pub fields: &'static [(&'static str, FieldValue)],
    /// Token presentation
    pub token: TokenUse,
    /// Success condition
    pub check: ApplyCheck,
}

/// One firmware generation of a vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Short name used in logs
    pub name: &'static str,
    /// Login request
    pub login: LoginTemplate,
    /// Rule request
    pub apply: ApplyTemplate,
}

/// All known dialects of one vendor, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorProfile {
    /// Vendor tag as shown to the user
    pub tag: &'static str,
    /// Dialects, newest first
    pub dialects: &'static [Dialect],
}

const fn form_login(
    path: &'static str,
    username_field: &'static str,
    password_field: &'static str,
    password: PasswordEncoding,
    cookie: &'static str,
) -> LoginTemplate {
    LoginTemplate {
        scheme: Scheme::Http,
        path,
        method: LoginMethod::Form,
        username_field,
        password_field,
        password,
        extra: &[],
        token: TokenSource::Cookie(cookie),
        check: LoginCheck::TokenPresent,
    }
}

const fn json_login(
    scheme: Scheme,
    path: &'static str,
    username_field: &'static str,
    password: PasswordEncoding,
    token: TokenSource,
) -> LoginTemplate {
    LoginTemplate {
        scheme,
        path,
        method: LoginMethod::Json,
        username_field,
        password_field: "password",
        password,
        extra: &[],
        token,
        check: LoginCheck::TokenPresent,
    }
}

const fn basic_login(scheme: Scheme, path: &'static str, check: LoginCheck) -> LoginTemplate {
    LoginTemplate {
        scheme,
        path,
        method: LoginMethod::BasicProbe,
        username_field: "",
        password_field: "",
        password: PasswordEncoding::Plain,
        extra: &[],
        token: TokenSource::None,
        check,
    }
}

const fn form_apply(
    path: &'static str,
    fields: &'static [(&'static str, FieldValue)],
    token: TokenUse,
) -> ApplyTemplate {
    ApplyTemplate {
        scheme: Scheme::Http,
        path,
        encoding: RuleEncoding::Form,
        fields,
        token,
        check: ApplyCheck::Status200,
    }
}

const fn json_apply(
    scheme: Scheme,
    path: &'static str,
    fields: &'static [(&'static str, FieldValue)],
    token: TokenUse,
) -> ApplyTemplate {
    ApplyTemplate {
        scheme,
        path,
        encoding: RuleEncoding::Json,
        fields,
        token,
        check: ApplyCheck::Status200,
    }
}

const fn single(name: &'static str, login: LoginTemplate, apply: ApplyTemplate) -> Dialect {
    Dialect { name, login, apply }
}

/// Every vendor with a dedicated driver
pub static PROFILES: &[VendorProfile] = &[
    VendorProfile {
        tag: "ASUS",
        dialects: &[single(
            "asuswrt",
            form_login("/login.cgi", "login_username", "login_passwd", Plain, "asus_token"),
            ApplyTemplate {
                scheme: Http,
                path: "/start_apply.htm",
                encoding: RuleEncoding::BatchForm,
                fields: &[
                    ("action_mode", F::Text("apply")),
                    ("current_page", F::Text("Advanced_VirtualServer_Content.asp")),
                    ("next_page", F::Text("Advanced_VirtualServer_Content.asp")),
                    ("modified", F::Text("0")),
                    ("action_script", F::Text("restart_firewall")),
                    ("vts_enable_x", F::Text("1")),
                    ("vts_desc_x_{i}", F::Label),
                    ("vts_port_x_{i}", F::ExtPort),
                    ("vts_ipaddr_x_{i}", F::TargetIp),
                    ("vts_proto_x_{i}", F::Proto),
                    ("vts_protono_x_{i}", F::Text("0")),
                ],
                token: TokenUse::Cookie("asus_token"),
                check: ApplyCheck::Status200,
            },
        )],
    },
    VendorProfile {
        tag: "TP-Link",
        dialects: &[
            single(
                "luci",
                json_login(
                    Http,
                    "/cgi-bin/luci/;stok=/login?form=login",
                    "username",
                    Md5Hex,
                    TokenSource::JsonField("data.stok"),
                ),
                json_apply(
                    Http,
                    "/cgi-bin/luci/;stok={token}/admin/port_forward/add",
                    &[
                        ("protocol", F::Proto),
                        ("externalPort", F::ExtPort),
                        ("internalPort", F::IntPort),
                        ("internalIP", F::TargetIp),
                        ("description", F::Label),
                    ],
                    TokenUse::PathPlaceholder,
                ),
            ),
            single(
                "userRpm",
                basic_login(Http, "/userRpm/LoginRpm.htm", LoginCheck::BodyContains("Main")),
                ApplyTemplate {
                    scheme: Http,
                    path: "/userRpm/VirtualServerRpm.htm",
                    encoding: RuleEncoding::LegacyLines {
                        field: "port_forward_rules",
                    },
                    fields: &[("Save", F::Text("Save"))],
                    token: TokenUse::Basic,
                    check: ApplyCheck::BodyContains("Settings saved"),
                },
            ),
        ],
    },
    VendorProfile {
        tag: "Netgear",
        dialects: &[
            single(
                "soap",
                LoginTemplate {
                    scheme: Http,
                    path: "/soap/server_sa",
                    method: LoginMethod::Soap {
                        action: "Authenticate",
                        soap_action: "http://purenetworks.com/HNAP1/Login",
                        session_id: "A7D88AE69687E58D9A00",
                    },
                    username_field: "Username",
                    password_field: "Password",
                    password: Plain,
                    extra: &[],
                    token: TokenSource::SoapElement("SessionID"),
                    check: LoginCheck::TokenPresent,
                },
                ApplyTemplate {
                    scheme: Http,
                    path: "/soap/server_sa",
                    encoding: RuleEncoding::Soap {
                        action: "AddPortMapping",
                    },
                    fields: &[
                        ("PortMappingDescription", F::Label),
                        ("InternalClient", F::TargetIp),
                        ("PortMappingProtocol", F::Proto),
                        ("ExternalPort", F::ExtPort),
                        ("InternalPort", F::IntPort),
                    ],
                    token: TokenUse::SoapSession,
                    check: ApplyCheck::Status200,
                },
            ),
            single(
                "legacy",
                basic_login(Http, "/start.htm", LoginCheck::Status200),
                form_apply(
                    "/forwarding.cgi",
                    &[
                        ("protocol", F::Proto),
                        ("external_port", F::ExtPort),
                        ("internal_port", F::IntPort),
                        ("internal_ip", F::TargetIp),
                        ("desc", F::Label),
                        ("apply", F::Text("Apply")),
                    ],
                    TokenUse::Basic,
                ),
            ),
        ],
    },
    VendorProfile {
        tag: "Linksys",
        dialects: &[single(
            "cgi",
            form_login("/admin/login.cgi", "username", "password", Plain, "PHPSESSID"),
            form_apply(
                "/admin/forward.cgi",
                &[
                    ("single_port", F::Text("1")),
                    ("name", F::Label),
                    ("ext_port", F::ExtPort),
                    ("int_port", F::IntPort),
                    ("protocol", F::Proto),
                    ("int_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("PHPSESSID"),
            ),
        )],
    },
    VendorProfile {
        tag: "D-Link",
        dialects: &[single(
            "cgi",
            form_login("/login.cgi", "username", "password", Base64, "uid"),
            form_apply(
                "/portforward.cgi",
                &[
                    ("name", F::Label),
                    ("public_port", F::ExtPort),
                    ("private_port", F::IntPort),
                    ("protocol", F::Proto),
                    ("local_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                    ("schedule", F::Text("Always")),
                ],
                TokenUse::Cookie("uid"),
            ),
        )],
    },
    VendorProfile {
        tag: "Cisco",
        dialects: &[single(
            "web",
            LoginTemplate {
                extra: &[("submit", "Login")],
                ..form_login("/login", "username", "password", Plain, "sessionid")
            },
            form_apply(
                "/firewall/portforward/add",
                &[
                    ("description", F::Label),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("protocol", F::Proto),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("sessionid"),
            ),
        )],
    },
    VendorProfile {
        tag: "Belkin",
        dialects: &[single(
            "php",
            form_login("/login.php", "username", "password", Md5Hex, "session"),
            form_apply(
                "/forward.php",
                &[
                    ("description", F::Label),
                    ("internalPort", F::IntPort),
                    ("externalPort", F::ExtPort),
                    ("protocol", F::Proto),
                    ("internalClient", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("session"),
            ),
        )],
    },
    VendorProfile {
        tag: "Buffalo",
        dialects: &[single(
            "basic",
            basic_login(Http, "/admin.cgi", LoginCheck::Status200),
            form_apply(
                "/port_forward.cgi",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Basic,
            ),
        )],
    },
    VendorProfile {
        tag: "Zyxel",
        dialects: &[single(
            "cgi",
            form_login("/login.cgi", "username", "password", Sha256Hex, "sid"),
            form_apply(
                "/nat-port-forward.cgi",
                &[
                    ("name", F::Label),
                    ("start_port", F::ExtPort),
                    ("end_port", F::ExtPort),
                    ("server_ip", F::TargetIp),
                    ("protocol", F::Proto),
                    ("enable", F::Text("1")),
                ],
                TokenUse::Cookie("sid"),
            ),
        )],
    },
    VendorProfile {
        tag: "Huawei",
        dialects: &[single(
            "api",
            LoginTemplate {
                password_field: "Password",
                ..json_login(
                    Http,
                    "/api/system/user_login",
                    "Username",
                    Sha256Hex,
                    TokenSource::Header("set-cookie"),
                )
            },
            json_apply(
                Http,
                "/api/security/virtual_server",
                &[
                    ("Name", F::Label),
                    ("Protocol", F::Proto),
                    ("ExternalPort", F::ExtPort),
                    ("InternalPort", F::IntPort),
                    ("InternalClient", F::TargetIp),
                    ("Enable", F::Int(1)),
                ],
                TokenUse::Header("Cookie"),
            ),
        )],
    },
    VendorProfile {
        tag: "Ubiquiti",
        dialects: &[single(
            "unifi",
            json_login(
                Https,
                "/api/auth/login",
                "username",
                Plain,
                TokenSource::JsonField("token"),
            ),
            json_apply(
                Https,
                "/api/s/default/rest/portforward",
                &[
                    ("name", F::Label),
                    ("proto", F::Proto),
                    ("src_port", F::ExtPort),
                    ("dst_port", F::IntPort),
                    ("dst_addr", F::TargetIp),
                    ("enabled", F::Bool(true)),
                ],
                TokenUse::Bearer,
            ),
        )],
    },
    VendorProfile {
        tag: "MikroTik",
        dialects: &[single(
            "rest",
            json_login(
                Http,
                "/rest/system/user/login",
                "name",
                Plain,
                TokenSource::Cookie("jwt"),
            ),
            json_apply(
                Http,
                "/rest/ip/firewall/nat",
                &[
                    ("comment", F::Label),
                    ("protocol", F::ProtoLower),
                    ("dst-port", F::ExtPort),
                    ("to-ports", F::IntPort),
                    ("to-addresses", F::TargetIp),
                    ("action", F::Text("dst-nat")),
                    ("chain", F::Text("dstnat")),
                    ("disabled", F::Text("false")),
                ],
                TokenUse::Cookie("jwt"),
            ),
        )],
    },
    VendorProfile {
        tag: "NETIS",
        dialects: &[single(
            "php",
            form_login("/login.php", "username", "password", Md5Hex, "NETIS_SESSION"),
            form_apply(
                "/port_forward.php",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("NETIS_SESSION"),
            ),
        )],
    },
    VendorProfile {
        tag: "Tenda",
        dialects: &[single(
            "goform",
            json_login(
                Http,
                "/login/Auth",
                "username",
                Md5Hex,
                TokenSource::Cookie("SESSIONID"),
            ),
            json_apply(
                Http,
                "/goform/virtualServer",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("outPort", F::ExtPort),
                    ("inPort", F::IntPort),
                    ("ipAddr", F::TargetIp),
                    ("enable", F::Int(1)),
                ],
                TokenUse::Cookie("SESSIONID"),
            ),
        )],
    },
    VendorProfile {
        tag: "EnGenius",
        dialects: &[single(
            "cgi",
            form_login("/cgi-bin/auth.cgi", "username", "password", Base64, "session_id"),
            form_apply(
                "/cgi-bin/port_forwarding.cgi",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("public_port", F::ExtPort),
                    ("private_port", F::IntPort),
                    ("server_ip", F::TargetIp),
                    ("enable", F::Text("on")),
                ],
                TokenUse::Cookie("session_id"),
            ),
        )],
    },
    VendorProfile {
        tag: "Actiontec",
        dialects: &[single(
            "cgi",
            form_login("/login.cgi", "username", "password", Plain, "sessionKey"),
            form_apply(
                "/port_forwarding.cgi",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_client", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("sessionKey"),
            ),
        )],
    },
    VendorProfile {
        tag: "AirTies",
        dialects: &[single(
            "api",
            json_login(
                Http,
                "/login",
                "username",
                Sha256Hex,
                TokenSource::Header("X-Session-Token"),
            ),
            json_apply(
                Http,
                "/api/port_forward",
                &[
                    ("description", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Bool(true)),
                ],
                TokenUse::Header("X-Session-Token"),
            ),
        )],
    },
    VendorProfile {
        tag: "Arris",
        dialects: &[single(
            "asp",
            form_login("/login", "username", "password", Md5Hex, "session"),
            form_apply(
                "/port_forward.asp",
                &[
                    ("description", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("dest_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("session"),
            ),
        )],
    },
    VendorProfile {
        tag: "Motorola",
        dialects: &[single(
            "goform",
            form_login("/goform/login", "username", "password", Md5Hex, "sessionid"),
            form_apply(
                "/goform/PortForwarding",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("public_port", F::ExtPort),
                    ("private_port", F::IntPort),
                    ("local_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("sessionid"),
            ),
        )],
    },
    VendorProfile {
        tag: "Sagemcom",
        dialects: &[single(
            "api-v1",
            json_login(
                Http,
                "/api/v1/login",
                "username",
                Sha256Hex,
                TokenSource::JsonField("token"),
            ),
            json_apply(
                Http,
                "/api/v1/nat/portforwarding",
                &[
                    ("description", F::Label),
                    ("protocol", F::Proto),
                    ("externalPort", F::ExtPort),
                    ("internalPort", F::IntPort),
                    ("destinationIp", F::TargetIp),
                    ("enabled", F::Bool(true)),
                ],
                TokenUse::Bearer,
            ),
        )],
    },
    VendorProfile {
        tag: "Thomson",
        dialects: &[single(
            "cgi",
            form_login("/cgi/login", "user", "pwd", Base64, "sessionid"),
            form_apply(
                "/cgi/portforwarding",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("sessionid"),
            ),
        )],
    },
    VendorProfile {
        tag: "Technicolor",
        dialects: &[single(
            "web",
            form_login("/login", "username", "password", Md5Hex, "session"),
            form_apply(
                "/portforward",
                &[
                    ("label", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("destination", F::TargetIp),
                    ("enable", F::Text("1")),
                ],
                TokenUse::Cookie("session"),
            ),
        )],
    },
    VendorProfile {
        tag: "Zoom",
        dialects: &[single(
            "goform",
            form_login("/goform/login", "userName", "userPwd", Sha256Hex, "sessionKey"),
            form_apply(
                "/goform/PortMapping",
                &[
                    ("ruleName", F::Label),
                    ("protocol", F::Proto),
                    ("publicPort", F::ExtPort),
                    ("privatePort", F::IntPort),
                    ("localIP", F::TargetIp),
                    ("enable", F::Text("1")),
                ],
                TokenUse::Cookie("sessionKey"),
            ),
        )],
    },
    VendorProfile {
        tag: "Billion",
        dialects: &[single(
            "cgi",
            form_login("/login.cgi", "username", "password", Md5Hex, "sessionid"),
            form_apply(
                "/portforward.cgi",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("sessionid"),
            ),
        )],
    },
    VendorProfile {
        tag: "SmartRG",
        dialects: &[single(
            "api-v1",
            json_login(
                Http,
                "/api/v1/session",
                "username",
                Sha256Hex,
                TokenSource::JsonField("token"),
            ),
            json_apply(
                Http,
                "/api/v1/nat/port-forward",
                &[
                    ("description", F::Label),
                    ("protocol", F::Proto),
                    ("wan_port", F::ExtPort),
                    ("lan_port", F::IntPort),
                    ("lan_ip", F::TargetIp),
                    ("enabled", F::Bool(true)),
                ],
                TokenUse::Bearer,
            ),
        )],
    },
    VendorProfile {
        tag: "Edimax",
        dialects: &[single(
            "cgi",
            form_login("/cgi-bin/login.cgi", "username", "password", Md5Hex, "session_id"),
            form_apply(
                "/cgi-bin/port_forwarding.cgi",
                &[
                    ("name", F::Label),
                    ("protocol", F::Proto),
                    ("public_port", F::ExtPort),
                    ("private_port", F::IntPort),
                    ("ip_addr", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("session_id"),
            ),
        )],
    },
    VendorProfile {
        tag: "Comtrend",
        dialects: &[single(
            "cgi",
            form_login("/login.cgi", "username", "password", Base64, "sessionKey"),
            form_apply(
                "/nat/portforward.cgi",
                &[
                    ("description", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_client", F::TargetIp),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("sessionKey"),
            ),
        )],
    },
    VendorProfile {
        tag: "Pace",
        dialects: &[single(
            "api",
            json_login(
                Http,
                "/login",
                "username",
                Sha256Hex,
                TokenSource::JsonField("access_token"),
            ),
            json_apply(
                Http,
                "/api/port-forwarding",
                &[
                    ("description", F::Label),
                    ("protocol", F::Proto),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Bool(true)),
                ],
                TokenUse::Bearer,
            ),
        )],
    },
    VendorProfile {
        tag: "Xiaomi",
        dialects: &[single(
            "xqsystem",
            LoginTemplate {
                method: LoginMethod::NonceJson {
                    nonce_path: "/cgi-bin/luci/api/xqsystem/nonce",
                },
                ..json_login(
                    Http,
                    "/cgi-bin/luci/api/xqsystem/login",
                    "username",
                    Sha1NonceHex,
                    TokenSource::JsonField("token"),
                )
            },
            json_apply(
                Http,
                "/cgi-bin/luci/api/xqsystem/port_forward",
                &[
                    ("name", F::Label),
                    ("proto", F::ProtoLower),
                    ("external_port", F::ExtPort),
                    ("internal_port", F::IntPort),
                    ("internal_ip", F::TargetIp),
                    ("enabled", F::Bool(true)),
                ],
                TokenUse::Header("Authorization"),
            ),
        )],
    },
    VendorProfile {
        tag: "Fios-G1100",
        dialects: &[single(
            "basic",
            basic_login(Https, "/", LoginCheck::Status200),
            json_apply(
                Https,
                "/api/firewall/portforwarding",
                &[
                    ("description", F::Label),
                    ("protocol", F::Proto),
                    ("destination_ip", F::TargetIp),
                    ("destination_port", F::IntPort),
                    ("source_port", F::ExtPort),
                    ("enabled", F::Bool(true)),
                ],
                TokenUse::Basic,
            ),
        )],
    },
    VendorProfile {
        tag: "OpenWrt",
        dialects: &[single(
            "luci",
            form_login(
                "/cgi-bin/luci/admin/login",
                "luci_username",
                "luci_password",
                Plain,
                "sysauth",
            ),
            form_apply(
                "/cgi-bin/luci/admin/network/firewall/forwards",
                &[
                    ("name", F::Label),
                    ("proto", F::ProtoLower),
                    ("src_port", F::ExtPort),
                    ("dest_port", F::IntPort),
                    ("dest_ip", F::TargetIp),
                    ("target", F::Text("DNAT")),
                    ("enabled", F::Text("1")),
                ],
                TokenUse::Cookie("sysauth"),
            ),
        )],
    },
];

/// Profile for `tag`, compared case-insensitively
pub fn find_profile(tag: &str) -> Option<&'static VendorProfile> {
    let tag = tag.trim();
    PROFILES
        .iter()
        .find(|profile| profile.tag.eq_ignore_ascii_case(tag))
}

/// Tags of every vendor with a dedicated driver
pub fn supported_vendors() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|profile| profile.tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_vendors_present() {
        assert_eq!(PROFILES.len(), 31);
        let unique: HashSet<_> = supported_vendors().map(str::to_lowercase).collect();
        assert_eq!(unique.len(), 31);
    }

    #[test]
    fn test_every_dialect_has_fields() {
        for profile in PROFILES {
            assert!(!profile.dialects.is_empty(), "{} has no dialect", profile.tag);
            for dialect in profile.dialects {
                assert!(dialect.login.path.starts_with('/'));
                assert!(dialect.apply.path.starts_with('/'));
                assert!(!dialect.apply.fields.is_empty() || matches!(
                    dialect.apply.encoding,
                    RuleEncoding::LegacyLines { .. }
                ));
            }
        }
    }

    #[test]
    fn test_lookup_ignores_case() {
        assert_eq!(find_profile("tp-link").map(|p| p.tag), Some("TP-Link"));
        assert_eq!(find_profile(" OPENWRT ").map(|p| p.tag), Some("OpenWrt"));
        assert!(find_profile("Generic").is_none());
    }
}
