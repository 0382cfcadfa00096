pub mod route_routes;
