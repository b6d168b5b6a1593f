use std::str::FromStr;

use crate::internal::*;

/// A reference to a tensor, `op_name:port`, or to a whole operation when
/// there is no colon.
///
/// The port is split on the last colon, operation names may contain colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorRef {
    /// the reference, as written
    pub spec: String,
    pub op: String,
    pub port: Option<usize>,
}

impl TensorRef {
    pub fn is_port(&self) -> bool {
        self.port.is_some()
    }
}

impl FromStr for TensorRef {
    type Err = CarveError;
    fn from_str(s: &str) -> CarveResult<TensorRef> {
        let (op, port) = match s.rsplit_once(':') {
            Some((op, port)) => {
                let port = port
                    .parse::<usize>()
                    .with_context(|| format!("Invalid port {port:?} in tensor reference {s:?}"))?;
                (op, Some(port))
            }
            None => (s, None),
        };
        ensure!(!op.is_empty(), "Empty operation name in tensor reference {:?}", s);
        Ok(TensorRef { spec: s.to_string(), op: op.to_string(), port })
    }
}

impl fmt::Display for TensorRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.spec)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn port_reference() {
        let r: TensorRef = "dien/rnn_2/gru2/add_2:0".parse().unwrap();
        assert_eq!(r.op, "dien/rnn_2/gru2/add_2");
        assert_eq!(r.port, Some(0));
        assert_eq!(r.to_string(), "dien/rnn_2/gru2/add_2:0");
    }

    #[test]
    fn last_colon_wins() {
        let r: TensorRef = "scope:inner:3".parse().unwrap();
        assert_eq!(r.op, "scope:inner");
        assert_eq!(r.port, Some(3));
    }

    #[test]
    fn operation_reference() {
        let r: TensorRef = "relu".parse().unwrap();
        assert_eq!(r.op, "relu");
        assert!(!r.is_port());
    }

    #[test]
    fn invalid_references() {
        assert!("relu:x".parse::<TensorRef>().is_err());
        assert!("relu:-1".parse::<TensorRef>().is_err());
        assert!("relu:".parse::<TensorRef>().is_err());
        assert!(":0".parse::<TensorRef>().is_err());
        assert!("".parse::<TensorRef>().is_err());
    }

    proptest! {
        #[test]
        fn parse_what_we_format(op in "[a-z_/:]{0,12}[a-z]", port in 0usize..1000) {
            let spec = format!("{op}:{port}");
            let r: TensorRef = spec.parse().unwrap();
            prop_assert_eq!(r.op, op);
            prop_assert_eq!(r.port, Some(port));
        }
    }
}
