// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Normalization and merge combinators over deferred values.
//!
//! Option records often offer a field in two shapes, a single `container`
//! and a list of `containers` for instance. [`normalize`] folds such a pair
//! into one ordered sequence, with the single value first. The merge
//! functions treat absent inputs as empty and keep argument order.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::output::{lift, Input, Output};

/// Fold a singular/plural input pair into one sequence, single value first.
pub fn normalize<T>(single: Option<Input<T>>, multiple: Option<Input<Vec<T>>>) -> Output<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    match (lift(single), lift(multiple)) {
        (Some(single), Some(multiple)) => single.zip(&multiple).map(|(first, rest)| {
            let mut items = Vec::with_capacity(rest.len() + 1);
            items.push(first);
            items.extend(rest);
            items
        }),
        (Some(single), None) => single.map(|v| vec![v]),
        (None, Some(multiple)) => multiple,
        (None, None) => Output::new(Vec::new()),
    }
}

/// [`normalize`] followed by an element-wise transform.
pub fn normalize_and_map<T, U, F>(
    single: Option<Input<T>>,
    multiple: Option<Input<Vec<T>>>,
    f: F,
) -> Output<Vec<U>>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(T) -> U + Send + 'static,
{
    normalize(single, multiple).map(move |items| items.into_iter().map(f).collect())
}

/// Apply `f` to every element of a deferred sequence.
pub fn map_each<T, U, F>(items: Input<Vec<T>>, f: F) -> Output<Vec<U>>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(T) -> U + Send + 'static,
{
    items
        .into_output()
        .map(move |items| items.into_iter().map(f).collect())
}

/// Flatten a deferred sequence of sequences.
pub fn flatten<T>(nested: Input<Vec<Vec<T>>>) -> Output<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    nested
        .into_output()
        .map(|nested| nested.into_iter().flatten().collect())
}

/// Concatenate sequences in argument order; `None` entries contribute nothing.
pub fn merge_arrays<T, I>(sequences: I) -> Output<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Option<Input<Vec<T>>>>,
{
    let present = sequences.into_iter().flatten().map(Input::into_output);
    Output::all(present).map(|parts| parts.into_iter().flatten().collect())
}

/// Shallow merge of maps; keys of later maps replace earlier ones.
///
/// Nested values are replaced wholesale, never merged.
pub fn merge_objects<K, V, I>(objects: I) -> Output<BTreeMap<K, V>>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Option<Input<BTreeMap<K, V>>>>,
{
    let present = objects.into_iter().flatten().map(Input::into_output);
    Output::all(present).map(|maps| {
        maps.into_iter().fold(BTreeMap::new(), |mut merged, map| {
            merged.extend(map);
            merged
        })
    })
}

/// `None` for an empty sequence, so absent and empty stay distinguishable.
pub fn none_if_empty<T>(items: Input<Vec<T>>) -> Output<Option<Vec<T>>>
where
    T: Clone + Send + Sync + 'static,
{
    items
        .into_output()
        .map(|items| if items.is_empty() { None } else { Some(items) })
}

/// Recursive merge of JSON values.
///
/// Objects merge key by key; scalars and arrays from `overlay` replace those
/// in `base`.
pub fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_normalize_both_puts_single_first() {
        let result = normalize(Some(Input::value(0)), Some(Input::value(vec![1, 2])));
        assert_eq!(result.resolve().await.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_normalize_single_only() {
        let result = normalize(Some(Input::value("a".to_string())), None);
        assert_eq!(result.resolve().await.unwrap(), strings(&["a"]));
    }

    #[tokio::test]
    async fn test_normalize_multiple_only_passes_through() {
        let result = normalize::<i32>(None, Some(Input::value(vec![4, 5, 6])));
        assert_eq!(result.resolve().await.unwrap(), vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_normalize_neither_is_empty() {
        let result = normalize::<i32>(None, None);
        assert_eq!(result.resolve().await.unwrap(), Vec::<i32>::new());
    }

    #[tokio::test]
    async fn test_normalize_length_property() {
        let cases: Vec<(Option<i32>, Option<Vec<i32>>)> = vec![
            (None, None),
            (Some(1), None),
            (None, Some(vec![])),
            (None, Some(vec![1, 2, 3])),
            (Some(9), Some(vec![])),
            (Some(9), Some(vec![1, 2])),
        ];

        for (single, multiple) in cases {
            let expected = single.map_or(0, |_| 1) + multiple.as_ref().map_or(0, Vec::len);
            let result = normalize(single.map(Input::value), multiple.map(Input::value))
                .resolve()
                .await
                .unwrap();
            assert_eq!(result.len(), expected);
        }
    }

    #[tokio::test]
    async fn test_normalize_deferred_single_is_one_element() {
        let deferred = Output::new(vec![1, 2]);
        let result = normalize::<Vec<i32>>(Some(Input::Output(deferred)), None);
        assert_eq!(result.resolve().await.unwrap(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn test_normalize_and_map_doubles() {
        let result = normalize_and_map(None, Some(Input::value(vec![1, 2, 3])), |x: i32| x * 2);
        assert_eq!(result.resolve().await.unwrap(), vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_map_each_and_flatten() {
        let mapped = map_each(Input::value(vec![1, 2]), |x: i32| vec![x; 2]);
        let flat = flatten(Input::Output(mapped));
        assert_eq!(flat.resolve().await.unwrap(), vec![1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn test_merge_arrays_skips_absent() {
        let with_gap = merge_arrays(vec![
            Some(Input::value(vec![1, 2])),
            None,
            Some(Input::Output(Output::new(vec![3]))),
        ]);
        let without_gap = merge_arrays(vec![
            Some(Input::value(vec![1, 2])),
            Some(Input::value(vec![3])),
        ]);

        assert_eq!(
            with_gap.resolve().await.unwrap(),
            without_gap.resolve().await.unwrap()
        );
        assert_eq!(with_gap.resolve().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_merge_arrays_keeps_duplicates() {
        let merged = merge_arrays(vec![
            Some(Input::value(vec!["a"])),
            Some(Input::value(vec!["a"])),
        ]);
        assert_eq!(merged.resolve().await.unwrap(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_merge_objects_disjoint_is_union() {
        let a = BTreeMap::from([("a".to_string(), 1)]);
        let b = BTreeMap::from([("b".to_string(), 2)]);

        let merged = merge_objects(vec![Some(Input::value(a)), None, Some(Input::value(b))])
            .resolve()
            .await
            .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[tokio::test]
    async fn test_merge_objects_later_wins_shallow() {
        let a = BTreeMap::from([("cfg".to_string(), json!({"x": 1, "y": 2}))]);
        let b = BTreeMap::from([("cfg".to_string(), json!({"x": 3}))]);

        let merged = merge_objects(vec![Some(Input::value(a)), Some(Input::value(b))])
            .resolve()
            .await
            .unwrap();

        assert_eq!(merged["cfg"], json!({"x": 3}));
    }

    #[tokio::test]
    async fn test_none_if_empty() {
        let empty = none_if_empty::<i32>(Input::value(Vec::new()));
        assert_eq!(empty.resolve().await.unwrap(), None);

        let full = none_if_empty(Input::value(vec![1]));
        assert_eq!(full.resolve().await.unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_deep_merge_nested_objects() {
        let mut base = json!({"image": {"repository": "nginx", "tag": "1.0"}, "replicas": 1});
        let overlay = json!({"image": {"tag": "2.0"}, "ports": [80]});

        deep_merge(&mut base, &overlay);

        assert_eq!(
            base,
            json!({"image": {"repository": "nginx", "tag": "2.0"}, "replicas": 1, "ports": [80]})
        );
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let mut base = json!({"args": ["a", "b"]});
        deep_merge(&mut base, &json!({"args": ["c"]}));
        assert_eq!(base, json!({"args": ["c"]}));
    }
}
