// Tenant surface OpenAPI endpoint definitions
// TES-71, TES-72, TES-74, TES-76: launch, poll, slug check, key validation

use serde_json::json;

/// Create tenant endpoint definition
pub fn create_tenant_endpoint() -> serde_json::Value {
    json!({
        "post": {
            "tags": ["Tenants"],
            "summary": "Launch a new tenant",
            "description": "Validates the request, creates the tenant and its launch job atomically, then drives the six-step pipeline in the background. Returns both identifiers immediately; progress is observed via the job poll endpoint.",
            "operationId": "createTenant",
            "security": [{"bearerAuth": []}],
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": {
                            "$ref": "#/components/schemas/CreateTenantRequest"
                        },
                        "example": {
                            "slug": "acme",
                            "display_name": "Acme Inc.",
                            "template": "standard",
                            "theme": "default",
                            "team_id": "b4a95a48-20aa-47a5-a9d8-1b0c7c4e22d1",
                            "admin_email": "owner@acme.com",
                            "custom_domain": "shop.acme.com",
                            "feature_flags": {"beta_dashboard": true},
                            "keys": {"maps_api_key": "AIza..."}
                        }
                    }
                }
            },
            "responses": {
                "201": {
                    "description": "Tenant and launch job created",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchResponse"
                            }
                        }
                    }
                },
                "409": {
                    "description": "Conflict - slug already taken or reserved",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            },
                            "examples": {
                                "slug_taken": {
                                    "value": {
                                        "error": "Slug already taken: acme",
                                        "code": "SLUG_TAKEN"
                                    }
                                },
                                "reserved_slug": {
                                    "value": {
                                        "error": "Slug is reserved: admin",
                                        "code": "RESERVED_SLUG"
                                    }
                                }
                            }
                        }
                    }
                },
                "422": {
                    "description": "Validation failed",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            },
                            "example": {
                                "error": "Validation error: Slug must be 3-30 characters",
                                "code": "VALIDATION_ERROR",
                                "details": {"field": "Slug must be 3-30 characters"}
                            }
                        }
                    }
                },
                "429": {
                    "description": "Too many requests - rate limit exceeded",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            },
                            "example": {
                                "error": "Rate limit exceeded. Try again in 42 seconds",
                                "code": "RATE_LIMIT_EXCEEDED",
                                "details": {"retry_after": 42}
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Job status endpoint definition
pub fn job_status_endpoint() -> serde_json::Value {
    json!({
        "get": {
            "tags": ["Tenants"],
            "summary": "Poll a launch job",
            "description": "Returns the job status, the full step array, the terminal error if any, and a projection of the owning tenant. Only the tenant's registered admin or a platform administrator may observe a job; anyone else receives the same 404 a nonexistent job produces.",
            "operationId": "getJobStatus",
            "security": [{"bearerAuth": []}],
            "parameters": [
                {
                    "name": "job_id",
                    "in": "path",
                    "required": true,
                    "schema": {"type": "string", "format": "uuid"},
                    "description": "Job identifier returned by the creation call"
                }
            ],
            "responses": {
                "200": {
                    "description": "Job status with step detail",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/JobStatusResponse"
                            }
                        }
                    }
                },
                "404": {
                    "description": "Job not found (or caller may not observe it)",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            },
                            "example": {
                                "error": "Not found",
                                "code": "NOT_FOUND"
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Slug availability endpoint definition
pub fn check_slug_endpoint() -> serde_json::Value {
    json!({
        "get": {
            "tags": ["Tenants"],
            "summary": "Check slug availability",
            "description": "Composes format validation, the reserved list, the platform registry, and the edge registrar into a single verdict. Unavailability always carries a reason.",
            "operationId": "checkSlug",
            "security": [{"bearerAuth": []}],
            "parameters": [
                {
                    "name": "slug",
                    "in": "path",
                    "required": true,
                    "schema": {"type": "string"},
                    "description": "Candidate subdomain slug",
                    "example": "acme"
                }
            ],
            "responses": {
                "200": {
                    "description": "Availability verdict",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/SlugAvailabilityResponse"
                            },
                            "examples": {
                                "available": {
                                    "value": {"available": true}
                                },
                                "taken": {
                                    "value": {
                                        "available": false,
                                        "reason": "Slug is already in use"
                                    }
                                }
                            }
                        }
                    }
                },
                "503": {
                    "description": "Edge registrar unreachable",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            },
                            "example": {
                                "error": "Service unavailable",
                                "code": "SERVICE_UNAVAILABLE"
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Key validation endpoint definition
pub fn validate_key_endpoint() -> serde_json::Value {
    json!({
        "post": {
            "tags": ["Tenants"],
            "summary": "Validate a tenant credential",
            "description": "Probes the provider for the given credential kind and reports a verdict. Platform-managed kinds (database_url, anon_key, service_role_key) are always rejected without an external call. Provider outages are reported as invalid with the reason in details, never as a server error.",
            "operationId": "validateTenantKey",
            "security": [{"bearerAuth": []}],
            "parameters": [
                {
                    "name": "tenant_id",
                    "in": "path",
                    "required": true,
                    "schema": {"type": "string", "format": "uuid"},
                    "description": "Tenant the credential belongs to"
                }
            ],
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": {
                            "$ref": "#/components/schemas/ValidateKeyRequest"
                        },
                        "example": {
                            "kind": "maps_api_key",
                            "value": "AIzaSyD..."
                        }
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "Validator verdict",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/KeyValidationResult"
                            },
                            "examples": {
                                "accepted": {
                                    "value": {
                                        "valid": true,
                                        "message": "Key accepted by the provider"
                                    }
                                },
                                "rejected": {
                                    "value": {
                                        "valid": false,
                                        "message": "Provider rejected the key",
                                        "details": {"status": 401}
                                    }
                                }
                            }
                        }
                    }
                },
                "404": {
                    "description": "Tenant not found (or caller may not act on it)",
                    "content": {
                        "application/json": {
                            "schema": {
                                "$ref": "#/components/schemas/LaunchErrorResponse"
                            }
                        }
                    }
                }
            }
        }
    })
}
