use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

// Layout of the 16 bit key code space.
const FIRST_VIRTUAL: u16 = 0xF000;
const VIRTUAL_COUNT: u16 = 256;
const ANY: u16 = FIRST_VIRTUAL + VIRTUAL_COUNT;
const TIMEOUT: u16 = ANY + 1;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("key_codes.rs");
    let mut f = File::create(&dest_path).unwrap();

    // Generate the Key newtype wrapper
    writeln!(
        f,
        r#"
/// Represents a single key identifier.
///
/// Physical keys use the Linux input-event-codes.h values. The upper part of
/// the code space holds the virtual keys and the reserved identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Key(pub u16);

impl Key {{
    /// Sentinel used by the release marker event
    pub const NONE: Key = Key(0);
    /// First of the {virtual_count} virtual keys
    pub const FIRST_VIRTUAL: Key = Key({first_virtual:#06X});
    /// Last virtual key
    pub const LAST_VIRTUAL: Key = Key({last_virtual:#06X});
    /// Wildcard matching every physical key
    pub const ANY: Key = Key({any:#06X});
    /// Pseudo key carrying timeout durations
    pub const TIMEOUT: Key = Key({timeout:#06X});
    /// Highest code a physical key may have
    pub const LAST_PHYSICAL: Key = Key({last_physical:#06X});

    /// Get the raw numeric code value
    pub fn code(self) -> u16 {{
        self.0
    }}

    /// Get the name of this key
    pub fn name(self) -> std::borrow::Cow<'static, str> {{
        key_name(self)
    }}

    /// Virtual key with the given index
    pub fn virtual_key(index: u8) -> Key {{
        Key({first_virtual:#06X} + index as u16)
    }}

    pub fn is_physical(self) -> bool {{
        self.0 != 0 && self.0 <= {last_physical:#06X}
    }}

    pub fn is_virtual(self) -> bool {{
        self.0 >= {first_virtual:#06X} && self.0 <= {last_virtual:#06X}
    }}
}}

impl From<u16> for Key {{
    fn from(code: u16) -> Self {{
        Key(code)
    }}
}}

impl From<Key> for u16 {{
    fn from(key: Key) -> Self {{
        key.0
    }}
}}

impl fmt::Display for Key {{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {{
        write!(f, "{{}}", self.name())
    }}
}}

impl FromStr for Key {{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {{
        key_from_name(s).ok_or_else(|| format!("Unknown key: {{}}", s))
    }}
}}
"#,
        virtual_count = VIRTUAL_COUNT,
        first_virtual = FIRST_VIRTUAL,
        last_virtual = FIRST_VIRTUAL + VIRTUAL_COUNT - 1,
        any = ANY,
        timeout = TIMEOUT,
        last_physical = FIRST_VIRTUAL - 1,
    )
    .unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
