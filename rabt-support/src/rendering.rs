//! Text rendering utilities for registration diagnostics.
//!
//! Provides helpers to format type names, decorator chains, resolution
//! paths and registration plans in error messages and logs.

/// Renders a resolution path as a readable string.
///
/// # Examples
/// ```
/// use rabt_support::rendering::render_path;
///
/// let path = vec!["OrderService", "OrderRepository", "OrderService"];
/// assert_eq!(render_path(&path), "OrderService → OrderRepository → OrderService");
/// ```
pub fn render_path(path: &[impl AsRef<str>]) -> String {
    path.iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders a decorator chain from the outermost layer inwards.
///
/// ```
/// use rabt_support::rendering::render_decorator_chain;
///
/// let rendered = render_decorator_chain(&["Logging", "Caching"], "Operation");
/// assert_eq!(rendered, "Logging(Caching(Operation))");
///
/// let bare = render_decorator_chain(&[] as &[&str], "Operation");
/// assert_eq!(bare, "Operation");
/// ```
pub fn render_decorator_chain(outer_to_inner: &[impl AsRef<str>], base: &str) -> String {
    let mut rendered = String::new();
    for layer in outer_to_inner {
        rendered.push_str(layer.as_ref());
        rendered.push('(');
    }
    rendered.push_str(base);
    rendered.push_str(&")".repeat(outer_to_inner.len()));
    rendered
}

/// A row of a rendered registration plan.
#[derive(Debug, Clone)]
pub struct PlanRow {
    /// Service type name
    pub service: String,
    /// Implementation description (type name, `factory`, `instance`, ...)
    pub implementation: String,
    /// Lifetime name
    pub lifetime: String,
    /// Optional lookup key
    pub key: Option<String>,
}

/// Renders registration rows as an aligned table.
///
/// ```text
/// #0 [Singleton] dyn Operation      => LoggingDecorator (factory)
/// #1 [Transient] dyn Handler        => OrderHandler
/// #2 [Scoped   ] dyn Store  key=eu  => EuStore
/// ```
pub fn render_plan(rows: &[PlanRow]) -> String {
    let lifetime_width = rows.iter().map(|r| r.lifetime.len()).max().unwrap_or(0);
    let service_width = rows
        .iter()
        .map(|r| r.service.len() + r.key.as_ref().map_or(0, |k| k.len() + 6))
        .max()
        .unwrap_or(0);

    let mut result = String::new();
    for (index, row) in rows.iter().enumerate() {
        let service = match &row.key {
            Some(key) => format!("{}  key={key}", row.service),
            None => row.service.clone(),
        };
        result.push_str(&format!(
            "#{index} [{:<lw$}] {:<sw$} => {}\n",
            row.lifetime,
            service,
            row.implementation,
            lw = lifetime_width,
            sw = service_width,
        ));
    }
    result
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use rabt_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("dyn my_app::store::Repository<my_app::model::Customer>");
/// assert_eq!(short, "dyn Repository<Customer>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                current_segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '&' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => current_segment.push(ch),
        }
    }

    result.push_str(&current_segment);
    result
}

/// Suggests registered type names close to a requested one.
///
/// Used for "did you mean?" hints when a service is not registered.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_short = shorten_type_name(name).to_lowercase();

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 100));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
