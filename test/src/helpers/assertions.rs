/// Assert that `$key` on `$node` holds the JSON value `$expected`
#[macro_export]
macro_rules! assert_attr {
    ($graph:expr, $node:expr, $key:expr, $($expected:tt)+) => {
        assert_eq!(
            $graph.get($node, $key),
            Some(&serde_json::json!($($expected)+)),
            "attribute '{}' of {:?}",
            $key,
            $node
        );
    };
}

/// Assert that `$key` is absent from `$node`'s attributes
#[macro_export]
macro_rules! assert_no_attr {
    ($graph:expr, $node:expr, $key:expr) => {
        assert_eq!(
            $graph.get($node, $key),
            None,
            "attribute '{}' of {:?} should be absent",
            $key,
            $node
        );
    };
}

/// Assert that `$log` saw `$name` on `$node` exactly `$count` times
#[macro_export]
macro_rules! assert_fired {
    ($log:expr, $name:expr, $node:expr, $count:expr) => {
        assert_eq!(
            $log.count($name, $node),
            $count,
            "'{}' on {:?}, events: {:?}",
            $name,
            $node,
            $log.names_for($node)
        );
    };
}

/// Assert that `$node` no longer waits on anything
#[macro_export]
macro_rules! assert_settled {
    ($graph:expr, $node:expr) => {
        assert!(
            $graph.fetch_queue($node).expect("model node").is_empty(),
            "{:?} still waits on {:?}",
            $node,
            $graph.fetch_queue($node)
        );
    };
}
