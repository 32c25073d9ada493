use std::fmt;

/// Keys handed out by a [`KeyGenerator`](crate::KeyGenerator).
pub trait GraphKey: Copy {
    fn to_u64(&self) -> u64;
    fn from_u64(value: u64) -> Self;
}

macro_rules! graph_key {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
        pub struct $name(u64);

        impl GraphKey for $name {
            fn to_u64(&self) -> u64 {
                self.0
            }

            fn from_u64(value: u64) -> Self {
                $name(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

graph_key!(
    /// Address of a model or collection node inside a [`Graph`](crate::Graph).
    NodeKey,
    "node#"
);

graph_key!(
    /// Token identifying one logical mutation. A deep change reaches each
    /// node once per origin.
    OriginId,
    "origin#"
);

graph_key!(
    /// Handle of a sync request passed to the [`Transport`](crate::Transport).
    RequestId,
    "request#"
);

graph_key!(SubscriptionId, "sub#");
