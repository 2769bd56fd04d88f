use serde::Deserialize;
use serde::Serialize;

// -
// Limits

/// Upper bound of variables in one SNMP bulk request
pub const MAX_SNMP_ITEMS: i32 = 128;
/// Items handed to one Java gateway request
pub const MAX_JAVA_ITEMS: usize = 32;
/// Items handed to one pinger batch
pub const MAX_PINGER_ITEMS: usize = 128;
/// Recursion cap for trigger dependency walks
pub const TRIGGER_DEPENDENCY_LEVELS_MAX: usize = 32;
/// Seconds one check may take; retries of unreachable hosts are spaced by it
pub const CHECK_TIMEOUT: i64 = 3;
/// "Never" for scheduling purposes
pub const JAN_2038: i64 = 2_147_483_647;

pub const SEC_PER_MIN: i64 = 60;
pub const SEC_PER_HOUR: i64 = 3600;
pub const SEC_PER_DAY: i64 = 86400;
pub const SEC_PER_WEEK: i64 = 7 * SEC_PER_DAY;
pub const SEC_PER_YEAR: i64 = 365 * SEC_PER_DAY;

/// Trigger functions re-evaluated on a timer regardless of new data
pub const TIMER_FUNCTIONS: &[&str] = &["nodata", "date", "dayofmonth", "dayofweek", "time", "now"];

/// Bit flags for `Item::flags`
pub const ITEM_FLAG_DISCOVERY_RULE: u8 = 0x01;
pub const ITEM_FLAG_DISCOVERY_PROTOTYPE: u8 = 0x02;

/// TLS connection flags for `Host::tls_connect` / `Host::tls_accept`
pub const TLS_UNENCRYPTED: u8 = 1;
pub const TLS_PSK: u8 = 2;
pub const TLS_CERT: u8 = 4;

/// Declares a `#[repr(u8)]` enum mirroring a numeric database column together with its
/// `TryFrom<u8>` decoding.
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $code:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $code),+
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(code: u8) -> std::result::Result<Self, u8> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }
    };
}

code_enum! {
    /// Check kind of an item
    pub enum ItemType {
        ZabbixAgent = 0,
        SnmpV1 = 1,
        Trapper = 2,
        Simple = 3,
        SnmpV2c = 4,
        Internal = 5,
        SnmpV3 = 6,
        ZabbixActive = 7,
        Aggregate = 8,
        HttpTest = 9,
        External = 10,
        DbMonitor = 11,
        Ipmi = 12,
        Ssh = 13,
        Telnet = 14,
        Calculated = 15,
        Jmx = 16,
        SnmpTrap = 17,
        Dependent = 18,
    }
}

code_enum! {
    pub enum ValueType {
        Float = 0,
        Str = 1,
        Log = 2,
        Uint64 = 3,
        Text = 4,
    }
}

code_enum! {
    pub enum HostStatus {
        Monitored = 0,
        NotMonitored = 1,
        Template = 3,
        ProxyActive = 5,
        ProxyPassive = 6,
    }
}

code_enum! {
    pub enum ItemStatus {
        Active = 0,
        Disabled = 1,
    }
}

code_enum! {
    pub enum ItemState {
        Normal = 0,
        NotSupported = 1,
    }
}

code_enum! {
    pub enum TriggerValue {
        Ok = 0,
        Problem = 1,
    }
}

code_enum! {
    pub enum TriggerState {
        Normal = 0,
        Unknown = 1,
    }
}

code_enum! {
    pub enum TriggerStatus {
        Enabled = 0,
        Disabled = 1,
    }
}

code_enum! {
    pub enum InterfaceType {
        Agent = 1,
        Snmp = 2,
        Ipmi = 3,
        Jmx = 4,
    }
}

code_enum! {
    pub enum MaintenanceType {
        Normal = 0,
        NoData = 1,
    }
}

code_enum! {
    pub enum Availability {
        Unknown = 0,
        Available = 1,
        Unavailable = 2,
    }
}

code_enum! {
    /// Item preprocessing step kinds
    pub enum PreprocStepType {
        Multiplier = 1,
        Rtrim = 2,
        Ltrim = 3,
        Trim = 4,
        Regsub = 5,
        Bool2Dec = 6,
        Oct2Dec = 7,
        Hex2Dec = 8,
        DeltaValue = 9,
        DeltaSpeed = 10,
        Xpath = 11,
        JsonPath = 12,
    }
}

code_enum! {
    /// What a failing preprocessing step does with the value
    pub enum ErrorHandler {
        Default = 0,
        Discard = 1,
        SetValue = 2,
        SetError = 3,
    }
}

impl PreprocStepType {
    pub fn is_delta(self) -> bool {
        matches!(self, PreprocStepType::DeltaValue | PreprocStepType::DeltaSpeed)
    }
}

/// Poller classes, each with its own scheduling queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollerType {
    Normal,
    Unreachable,
    Ipmi,
    Pinger,
    Java,
}

impl PollerType {
    pub const COUNT: usize = 5;
    pub const ALL: [PollerType; PollerType::COUNT] = [
        PollerType::Normal,
        PollerType::Unreachable,
        PollerType::Ipmi,
        PollerType::Pinger,
        PollerType::Java,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PollerType::Normal => "normal",
            PollerType::Unreachable => "unreachable",
            PollerType::Ipmi => "ipmi",
            PollerType::Pinger => "pinger",
            PollerType::Java => "java",
        }
    }
}

/// Agent classes tracked separately in host availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentClass {
    Zabbix,
    Snmp,
    Ipmi,
    Jmx,
}

impl AgentClass {
    pub const COUNT: usize = 4;
    pub const ALL: [AgentClass; AgentClass::COUNT] =
        [AgentClass::Zabbix, AgentClass::Snmp, AgentClass::Ipmi, AgentClass::Jmx];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit used in a host's used-interfaces mask
    pub fn flag(self) -> u8 {
        1 << (self as u8)
    }
}

/// Poll outcome reported back through `requeue_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckResult {
    Succeed,
    NotSupported,
    AgentError,
    ConfigError,
    NetworkError,
    GatewayError,
    TimeoutError,
}

impl CheckResult {
    /// Host reached, whatever the item outcome
    pub fn is_reachable(self) -> bool {
        matches!(
            self,
            CheckResult::Succeed
                | CheckResult::NotSupported
                | CheckResult::AgentError
                | CheckResult::ConfigError
        )
    }
}

impl ItemType {
    pub fn is_snmp(self) -> bool {
        matches!(self, ItemType::SnmpV1 | ItemType::SnmpV2c | ItemType::SnmpV3)
    }

    /// Availability class driven by checks of this type
    pub fn agent_class(self) -> Option<AgentClass> {
        match self {
            ItemType::ZabbixAgent => Some(AgentClass::Zabbix),
            ItemType::SnmpV1 | ItemType::SnmpV2c | ItemType::SnmpV3 => Some(AgentClass::Snmp),
            ItemType::Ipmi => Some(AgentClass::Ipmi),
            ItemType::Jmx => Some(AgentClass::Jmx),
            _ => None,
        }
    }

    pub fn interface_type(self) -> Option<InterfaceType> {
        match self.agent_class()? {
            AgentClass::Zabbix => Some(InterfaceType::Agent),
            AgentClass::Snmp => Some(InterfaceType::Snmp),
            AgentClass::Ipmi => Some(InterfaceType::Ipmi),
            AgentClass::Jmx => Some(InterfaceType::Jmx),
        }
    }
}

impl HostStatus {
    pub fn is_proxy(self) -> bool {
        matches!(self, HostStatus::ProxyActive | HostStatus::ProxyPassive)
    }
}
