//! Small, dependency-free naming and parameter-regularization helpers named
//! directly as testable core behavior in spec.md §8, kept in-core even
//! though the bulk benchmark-grade agent generator they're drawn from is an
//! external collaborator per §1 (see SPEC_FULL.md §8 for the scoping
//! decision).

use std::collections::HashMap;

use crate::algorithm::ParamValue;

/// `n` unique agent names, all padded to the width of `n - 1` so they sort
/// and line up lexicographically (`generate_agents_from_count(100)` →
/// `a00`..`a99`).
pub fn generate_agents_from_count(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let width = (n - 1).to_string().len();
    (0..n).map(|i| format!("a{:0width$}", i, width = width)).collect()
}

/// The longest common non-digit prefix shared by every name, or `""` if the
/// names disagree past the first character (`find_prefix(["x1","x2","V3"])`
/// = `""`).
pub fn find_prefix(names: &[impl AsRef<str>]) -> String {
    fn alpha_prefix(s: &str) -> &str {
        let end = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
        &s[..end]
    }

    let Some(first) = names.first() else {
        return String::new();
    };
    let mut prefix = alpha_prefix(first.as_ref());
    for name in &names[1..] {
        let candidate = alpha_prefix(name.as_ref());
        if candidate != prefix {
            return String::new();
        }
        prefix = candidate;
    }
    prefix.to_string()
}

/// The leading run of ASCII digits found right after `prefix` at the start
/// of `name`, if `name` starts with `prefix` and at least one digit follows
/// (pydcop's `re.compile(f"{prefix}(?P<index>\d+)").match(name)`).
fn leading_index(name: &str, prefix: &str) -> Option<u64> {
    let rest = name.strip_prefix(prefix)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Pair each agent with the variable sharing its numeric index, not its list
/// position: both sides are matched by the integer that follows `agt_prefix`
/// (default `"a"`) / `var_prefix` (default `"v"`) in their name — so
/// `find_corresponding_variables(["a1","a2","a3"], ["v01","v02","v03"])` →
/// `{"a1":"v01","a2":"v02","a3":"v03"}` because `1`/`01`, `2`/`02`, `3`/`03`
/// parse to the same index, not because the lists line up positionally
/// (pydcop's `find_corresponding_variables`).
pub fn find_corresponding_variables(
    agents: &[impl AsRef<str>],
    variables: &[impl AsRef<str>],
) -> HashMap<String, String> {
    find_corresponding_variables_with_prefixes(agents, variables, "a", "v")
}

/// `find_corresponding_variables` with explicit agent/variable prefixes.
pub fn find_corresponding_variables_with_prefixes(
    agents: &[impl AsRef<str>],
    variables: &[impl AsRef<str>],
    agt_prefix: &str,
    var_prefix: &str,
) -> HashMap<String, String> {
    let mut indexed_vars: HashMap<u64, String> = HashMap::new();
    for variable in variables {
        if let Some(index) = leading_index(variable.as_ref(), var_prefix) {
            indexed_vars.insert(index, variable.as_ref().to_string());
        }
    }

    let mut mapping = HashMap::new();
    for agent in agents {
        if let Some(index) = leading_index(agent.as_ref(), agt_prefix) {
            if let Some(variable) = indexed_vars.get(&index) {
                mapping.insert(agent.as_ref().to_string(), variable.clone());
            }
        }
    }
    mapping
}

/// Expand a map of parameter name to either a single value or a list of
/// candidate values into the cartesian product of those lists, one
/// fully-scalar parameter map per combination, preserving the order of the
/// first varying parameter's values (spec.md §8's parameter-regularization
/// scenario).
pub fn regularize_parameters(
    params: &HashMap<String, Vec<ParamValue>>,
) -> Vec<HashMap<String, ParamValue>> {
    let mut names: Vec<&String> = params.keys().collect();
    names.sort();

    let mut combos: Vec<HashMap<String, ParamValue>> = vec![HashMap::new()];
    for name in names {
        let values = &params[name];
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.insert(name.clone(), value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_agents_from_count_pads_to_a_stable_width() {
        let names = generate_agents_from_count(100);
        assert_eq!(100, names.len());
        assert_eq!("a00", names[0]);
        assert_eq!("a99", names[99]);
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(100, unique.len());
    }

    #[test]
    fn find_prefix_examples_from_spec() {
        assert_eq!("x", find_prefix(&["x1", "x2", "x3"]));
        assert_eq!("", find_prefix(&["x1", "x2", "V3"]));
    }

    #[test]
    fn find_corresponding_variables_examples_from_spec() {
        let map = find_corresponding_variables(
            &["a1", "a2", "a3"],
            &["v01", "v02", "v03"],
        );
        assert_eq!(Some(&"v01".to_string()), map.get("a1"));
        assert_eq!(Some(&"v02".to_string()), map.get("a2"));
        assert_eq!(Some(&"v03".to_string()), map.get("a3"));
    }

    #[test]
    fn find_corresponding_variables_matches_by_index_not_list_position() {
        // "a2" and "v02" share index 2 even though "v02" is listed first.
        let map = find_corresponding_variables(&["a1", "a2"], &["v02", "v01"]);
        assert_eq!(Some(&"v01".to_string()), map.get("a1"));
        assert_eq!(Some(&"v02".to_string()), map.get("a2"));
    }

    #[test]
    fn find_corresponding_variables_drops_unmatched_indices() {
        let map = find_corresponding_variables(&["a1", "a5"], &["v01"]);
        assert_eq!(1, map.len());
        assert_eq!(Some(&"v01".to_string()), map.get("a1"));
        assert_eq!(None, map.get("a5"));
    }

    #[test]
    fn regularize_parameters_expands_the_cartesian_product() {
        let mut params = HashMap::new();
        params.insert(
            "p1".to_string(),
            vec![ParamValue::Int(1), ParamValue::Int(2)],
        );
        params.insert(
            "p2".to_string(),
            vec![ParamValue::Str("c".to_string())],
        );
        let combos = regularize_parameters(&params);
        assert_eq!(2, combos.len());
        assert_eq!(Some(&ParamValue::Int(1)), combos[0].get("p1"));
        assert_eq!(Some(&ParamValue::Int(2)), combos[1].get("p1"));
        assert_eq!(Some(&ParamValue::Str("c".to_string())), combos[0].get("p2"));
    }
}
