// Health check endpoints OpenAPI documentation

use serde_json::json;

/// Health check endpoint documentation
pub fn health_endpoint() -> serde_json::Value {
    json!({
        "get": {
            "tags": ["Health"],
            "summary": "Health check endpoint",
            "description": "Returns the health status of the service and its dependencies",
            "operationId": "healthCheck",
            "responses": {
                "200": {
                    "description": "Service is healthy",
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "status": {
                                        "type": "string",
                                        "enum": ["healthy", "degraded"],
                                        "description": "Overall health status"
                                    },
                                    "service": {
                                        "type": "string",
                                        "description": "Service name"
                                    },
                                    "timestamp": {
                                        "type": "string",
                                        "format": "date-time",
                                        "description": "Health check timestamp"
                                    },
                                    "components": {
                                        "type": "object",
                                        "properties": {
                                            "postgresql": {
                                                "type": "object",
                                                "properties": {
                                                    "status": {
                                                        "type": "string",
                                                        "enum": ["healthy", "unhealthy"]
                                                    },
                                                    "max_connections": {
                                                        "type": "integer",
                                                        "nullable": true
                                                    },
                                                    "error": {
                                                        "type": "string",
                                                        "nullable": true
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            },
                            "example": {
                                "status": "healthy",
                                "service": "tessera-backend",
                                "timestamp": "2025-06-01T12:00:00Z",
                                "components": {
                                    "postgresql": {
                                        "status": "healthy",
                                        "max_connections": 10
                                    }
                                }
                            }
                        }
                    }
                },
                "503": {
                    "description": "Service is degraded - one or more dependencies are unhealthy"
                }
            }
        }
    })
}
