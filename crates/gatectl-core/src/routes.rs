//! The console's route table.

use std::fmt;

/// A page of the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    /// `/`, which forwards to the dashboard once admitted.
    Root,
    Dashboard,
    Routes,
    Upstreams,
    Consumers,
    Plugins,
    PluginList,
    Ssl,
    SystemConfig,
    TestPluginApi,
    /// Anything unmatched. Rendered outside the guard.
    NotFound,
}

impl Route {
    /// Navigation menu, in display order.
    pub const MENU: [Route; 7] = [
        Route::Dashboard,
        Route::Routes,
        Route::Upstreams,
        Route::Consumers,
        Route::Plugins,
        Route::Ssl,
        Route::SystemConfig,
    ];

    /// Matches a request path. Query strings, fragments and a trailing
    /// slash are ignored.
    pub fn from_path(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        match path {
            "/login" => Route::Login,
            "/" => Route::Root,
            "/dashboard" => Route::Dashboard,
            "/routes" => Route::Routes,
            "/upstreams" => Route::Upstreams,
            "/consumers" => Route::Consumers,
            "/plugins" => Route::Plugins,
            "/plugins/list" => Route::PluginList,
            "/ssl" => Route::Ssl,
            "/system-config" => Route::SystemConfig,
            "/test-plugin-api" => Route::TestPluginApi,
            _ => Route::NotFound,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Root => "/",
            Route::Dashboard => "/dashboard",
            Route::Routes => "/routes",
            Route::Upstreams => "/upstreams",
            Route::Consumers => "/consumers",
            Route::Plugins => "/plugins",
            Route::PluginList => "/plugins/list",
            Route::Ssl => "/ssl",
            Route::SystemConfig => "/system-config",
            Route::TestPluginApi => "/test-plugin-api",
            Route::NotFound => "*",
        }
    }

    /// Menu title.
    pub fn title(self) -> &'static str {
        match self {
            Route::Login => "登录",
            Route::Root | Route::Dashboard => "仪表板",
            Route::Routes => "路由管理",
            Route::Upstreams => "上游服务",
            Route::Consumers => "消费者",
            Route::Plugins | Route::PluginList => "插件配置",
            Route::Ssl => "SSL证书",
            Route::SystemConfig => "系统配置",
            Route::TestPluginApi => "插件接口测试",
            Route::NotFound => "页面不存在",
        }
    }

    pub fn requires_auth(self) -> bool {
        !matches!(self, Route::Login | Route::NotFound)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
