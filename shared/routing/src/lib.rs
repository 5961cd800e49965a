use http::Method;
use std::collections::HashMap;

#[derive(Debug)]
enum PathSegment {
    Static(String),
    Param(String),
}

#[derive(Debug)]
struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// Parses a path pattern string into a Path struct
    /// Supports:
    /// - Static segments: "/messages/receivers"
    /// - Dynamic parameters: "/messages/{folder_id}/{id}"
    pub fn parse(path_str: &str) -> Self {
        let normalized_path = path_str.trim().trim_matches('/');

        let segments: Vec<PathSegment> = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path
                .split('/')
                .map(|s| {
                    if let Some(stripped) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                        PathSegment::Param(stripped.to_string())
                    } else {
                        PathSegment::Static(s.to_string())
                    }
                })
                .collect()
        };

        Path { segments }
    }

    /// Matches a request path against this path pattern
    /// Returns Some(params) if match succeeds, None otherwise
    fn matches<'a>(&self, request_path: &'a str) -> Option<HashMap<String, &'a str>> {
        let normalized_path = request_path.trim().trim_matches('/');

        let request_segments: Vec<&'a str> = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path.split('/').collect()
        };

        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (seg, req_segment) in self.segments.iter().zip(request_segments) {
            match seg {
                PathSegment::Static(s) => {
                    if req_segment != s {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    if req_segment.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), req_segment);
                }
            }
        }

        Some(params)
    }
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, A> {
    pub params: HashMap<String, &'a str>,
    pub action: &'a A,
}

#[derive(Debug, PartialEq)]
pub enum Resolution<'a, A> {
    Matched(RouteMatch<'a, A>),
    /// The path is known but not for this method.
    MethodNotAllowed,
    NotFound,
}

#[derive(Debug)]
pub struct Route<A> {
    method: Method,
    path: Path,
    action: A,
}

impl<A> Route<A> {
    pub fn new(method: Method, path: &str, action: A) -> Self {
        Self {
            method,
            path: Path::parse(path),
            action,
        }
    }

    pub fn get(path: &str, action: A) -> Self {
        Self::new(Method::GET, path, action)
    }

    /// Returns Some(RouteMatch) if the path matches this route, ignoring the method.
    /// Trailing slash normalization is applied to incoming requests.
    pub fn matches<'a>(&'a self, request_path: &'a str) -> Option<RouteMatch<'a, A>> {
        let params = self.path.matches(request_path)?;
        Some(RouteMatch {
            params,
            action: &self.action,
        })
    }
}

pub struct RouteActions<A> {
    routes: Vec<Route<A>>,
}

impl<A> RouteActions<A> {
    pub fn new(routes: Vec<Route<A>>) -> Self {
        Self { routes }
    }

    /// Returns the first route matching both method and path. Routes are tried
    /// in declaration order.
    pub fn resolve<'a>(&'a self, method: &Method, path: &'a str) -> Resolution<'a, A> {
        let mut path_known = false;

        for route in &self.routes {
            if let Some(route_match) = route.matches(path) {
                if &route.method == method {
                    return Resolution::Matched(route_match);
                }
                path_known = true;
            }
        }

        if path_known {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_path() {
        let route = Route::get("/messages/receivers/", "receivers");
        assert!(route.matches("/messages/receivers").is_some(), "exact path");
        assert!(
            route.matches("/messages/receivers/").is_some(),
            "with trailing slash normalization"
        );
        assert!(
            route.matches("/messages/receivers/2").is_none(),
            "extra segment doesn't match"
        );
        assert!(
            route.matches("/messages/").is_none(),
            "missing segment doesn't match"
        );
    }

    #[test]
    fn test_dynamic_path() {
        let route = Route::get("/messages/{folder_id}/{id}", "detail");

        let result = route.matches("/messages/5/123");
        assert!(result.is_some());
        let route_match = result.unwrap();
        assert_eq!(route_match.params.get("folder_id").copied(), Some("5"));
        assert_eq!(route_match.params.get("id").copied(), Some("123"));
        assert_eq!(route_match.action, &"detail");

        assert!(route.matches("/messages/5").is_none());
        assert!(route.matches("/messages//5").is_none());
    }

    #[test]
    fn test_resolution_order_and_method() {
        let routes = RouteActions::new(vec![
            Route::get("/messages/feed", "feed"),
            Route::get("/messages/{folder_id}/{id}", "detail"),
            Route::get("/messages/{folder_id}", "folder"),
        ]);

        match routes.resolve(&Method::GET, "/messages/feed") {
            Resolution::Matched(m) => assert_eq!(m.action, &"feed"),
            other => panic!("unexpected resolution: {other:?}"),
        }
        match routes.resolve(&Method::GET, "/messages/6") {
            Resolution::Matched(m) => {
                assert_eq!(m.action, &"folder");
                assert_eq!(m.params.get("folder_id").copied(), Some("6"));
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
        assert_eq!(
            routes.resolve(&Method::POST, "/messages/feed"),
            Resolution::MethodNotAllowed
        );
        assert_eq!(routes.resolve(&Method::GET, "/grades"), Resolution::NotFound);
    }

    #[test]
    fn test_path_parsing() {
        // Test empty path
        let path = Path::parse("");
        assert_eq!(path.segments.len(), 0);

        // Test static path
        let path = Path::parse("/timetable/today");
        assert_eq!(path.segments.len(), 2);

        // Test dynamic path
        let path = Path::parse("/messages/{folder_id}/{id}");
        assert_eq!(path.segments.len(), 3);
        assert!(matches!(path.segments[2], PathSegment::Param(ref p) if p == "id"));
    }
}
