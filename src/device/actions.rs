//! Parameter set applied to the device before execution

/// Value of a named kernel scalar
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    UInt(u64),
    Double(f64),
    /// Stream offset parameter, in elements
    Offset(u64),
}

impl ScalarValue {
    /// Integer view, for `UInt` and `Offset`
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            ScalarValue::UInt(v) | ScalarValue::Offset(v) => Some(v),
            ScalarValue::Double(_) => None,
        }
    }

    /// Floating point view of any scalar
    pub fn as_f64(&self) -> f64 {
        match *self {
            ScalarValue::UInt(v) | ScalarValue::Offset(v) => v as f64,
            ScalarValue::Double(v) => v,
        }
    }
}

/// Scalars, kernel tick counts and stream options for one run.
///
/// Entries keep insertion order; setting the same `(block, name)` twice
/// replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actions {
    scalars: Vec<(String, String, ScalarValue)>,
    ticks: Vec<(String, u64)>,
    unsynced_streams: Vec<String>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an unsigned integer scalar of a kernel block
    pub fn set_uint(&mut self, block: &str, name: &str, value: u64) -> &mut Self {
        self.set(block, name, ScalarValue::UInt(value))
    }

    /// Set a floating point scalar of a kernel block
    pub fn set_double(&mut self, block: &str, name: &str, value: f64) -> &mut Self {
        self.set(block, name, ScalarValue::Double(value))
    }

    /// Set a stream offset parameter of a kernel block
    pub fn set_offset(&mut self, block: &str, name: &str, value: u64) -> &mut Self {
        self.set(block, name, ScalarValue::Offset(value))
    }

    fn set(&mut self, block: &str, name: &str, value: ScalarValue) -> &mut Self {
        match self
            .scalars
            .iter()
            .position(|(b, n, _)| b == block && n == name)
        {
            Some(i) => self.scalars[i].2 = value,
            None => self
                .scalars
                .push((block.to_string(), name.to_string(), value)),
        }
        self
    }

    /// Set the number of cycles a kernel runs for
    pub fn set_ticks(&mut self, block: &str, ticks: u64) -> &mut Self {
        match self.ticks.iter().position(|(b, _)| b == block) {
            Some(i) => self.ticks[i].1 = ticks,
            None => self.ticks.push((block.to_string(), ticks)),
        }
        self
    }

    /// Let a stream run without host/device synchronisation
    pub fn disable_stream_sync(&mut self, stream: &str) -> &mut Self {
        if !self.unsynced_streams.iter().any(|s| s == stream) {
            self.unsynced_streams.push(stream.to_string());
        }
        self
    }

    pub fn scalar(&self, block: &str, name: &str) -> Option<ScalarValue> {
        self.scalars
            .iter()
            .find(|(b, n, _)| b == block && n == name)
            .map(|(_, _, v)| *v)
    }

    pub fn ticks(&self, block: &str) -> Option<u64> {
        self.ticks.iter().find(|(b, _)| b == block).map(|(_, t)| *t)
    }

    pub fn is_stream_sync_disabled(&self, stream: &str) -> bool {
        self.unsynced_streams.iter().any(|s| s == stream)
    }

    /// All scalars in insertion order
    pub fn scalars(&self) -> impl Iterator<Item = (&str, &str, ScalarValue)> {
        self.scalars
            .iter()
            .map(|(b, n, v)| (b.as_str(), n.as_str(), *v))
    }
}
