// Platform administration OpenAPI endpoint definitions
// TES-82: Feature-flag propagation documentation

use serde_json::json;

/// Feature-flag propagation endpoint definition
pub fn propagate_flags_endpoint() -> serde_json::Value {
    json!({
        "post": {
            "tags": ["Admin"],
            "summary": "Propagate feature-flag defaults",
            "description": "Applies each flag to every unarchived tenant that does not already define it. Existing per-tenant values are never overwritten. Active, provisioned tenants also get their runtime configuration patched; a runtime write failure skips that tenant so the next sweep retries it. Requires the platform:admin scope.",
            "operationId": "propagateFeatureFlags",
            "security": [{"bearerAuth": []}],
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": {
                            "$ref": "#/components/schemas/PropagateFlagsRequest"
                        },
                        "example": {
                            "flags": {"beta_dashboard": false, "new_checkout": true}
                        }
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "Propagation summary",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/PropagateFlagsResponse"
                            },
                            "example": {"tenants_updated": 17}
                        }
                    }
                },
                "400": {
                    "description": "Bad request - invalid flag payload",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            },
                            "example": {
                                "error": "Invalid request: Feature flag names must be 1-64 characters",
                                "code": "BAD_REQUEST"
                            }
                        }
                    }
                },
                "403": {
                    "description": "Forbidden - platform administrator scope required",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            },
                            "example": {
                                "error": "Forbidden: Platform administrator scope required",
                                "code": "FORBIDDEN"
                            }
                        }
                    }
                }
            }
        }
    })
}
