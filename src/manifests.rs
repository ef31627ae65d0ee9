//! Manifest document bodies
//!
//! Pure data: the YAML documents the workflows apply, plus small renderers
//! for the ones parameterized by namespace. No logic lives here.

/// Deny all ingress traffic by default.
pub const DEFAULT_DENY_INGRESS: &str = "\
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: default-deny-ingress
spec:
  podSelector: {}
  policyTypes:
  - Ingress
";

/// Allow traffic between pods within the labeled namespace.
pub fn allow_namespace_internal(namespace: &str) -> String {
    format!(
        "\
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: allow-namespace-internal
spec:
  podSelector: {{}}
  policyTypes:
  - Ingress
  ingress:
  - from:
    - namespaceSelector:
        matchLabels:
          name: {namespace}
"
    )
}

/// Read-only service account with cluster-wide get/list/watch.
pub const READONLY_RBAC: &str = "\
---
apiVersion: v1
kind: ServiceAccount
metadata:
  name: readonly-user
  namespace: default
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: readonly-role
rules:
- apiGroups: [\"\"]
  resources: [\"pods\", \"services\", \"configmaps\", \"secrets\", \"namespaces\"]
  verbs: [\"get\", \"list\", \"watch\"]
- apiGroups: [\"apps\"]
  resources: [\"deployments\", \"replicasets\", \"statefulsets\"]
  verbs: [\"get\", \"list\", \"watch\"]
- apiGroups: [\"batch\"]
  resources: [\"jobs\", \"cronjobs\"]
  verbs: [\"get\", \"list\", \"watch\"]
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: readonly-binding
subjects:
- kind: ServiceAccount
  name: readonly-user
  namespace: default
roleRef:
  kind: ClusterRole
  name: readonly-role
  apiGroup: rbac.authorization.k8s.io
";

/// Trivy operator watching the default namespace for vulnerable images.
pub fn trivy_operator(namespace: &str) -> String {
    format!(
        "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: trivy-operator
  namespace: {namespace}
spec:
  replicas: 1
  selector:
    matchLabels:
      app: trivy-operator
  template:
    metadata:
      labels:
        app: trivy-operator
    spec:
      containers:
      - name: trivy-operator
        image: aquasec/trivy-operator:0.1.5
        args:
          - \"--target-namespaces=default\"
          - \"--log-level=info\"
        env:
          - name: OPERATOR_NAMESPACE
            valueFrom:
              fieldRef:
                fieldPath: metadata.namespace
          - name: OPERATOR_TARGET_NAMESPACES
            value: default
        resources:
          limits:
            cpu: 1
            memory: 1Gi
          requests:
            cpu: 200m
            memory: 100Mi
"
    )
}

/// One-shot CIS benchmark job. Needs host mounts and privilege to inspect
/// node configuration.
pub const KUBE_BENCH_JOB: &str = "\
apiVersion: batch/v1
kind: Job
metadata:
  name: kube-bench
spec:
  template:
    metadata:
      labels:
        app: kube-bench
    spec:
      hostPID: true
      containers:
      - name: kube-bench
        image: aquasec/kube-bench:latest
        command: [\"kube-bench\", \"--json\"]
        volumeMounts:
        - name: var-lib-kubelet
          mountPath: /var/lib/kubelet
          readOnly: true
        - name: etc-systemd
          mountPath: /etc/systemd
          readOnly: true
        - name: etc-kubernetes
          mountPath: /etc/kubernetes
          readOnly: true
        securityContext:
          privileged: true
      restartPolicy: Never
      volumes:
      - name: var-lib-kubelet
        hostPath:
          path: /var/lib/kubelet
      - name: etc-systemd
        hostPath:
          path: /etc/systemd
      - name: etc-kubernetes
        hostPath:
          path: /etc/kubernetes
";

/// ConfigMap pointing Grafana at the in-cluster Prometheus service.
pub fn grafana_datasource_configmap(namespace: &str) -> String {
    format!(
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: grafana-datasource
  namespace: {namespace}
  labels:
    grafana_datasource: \"1\"
data:
  datasource.yaml: |
    apiVersion: 1
    datasources:
    - name: Prometheus
      type: prometheus
      access: proxy
      url: http://prometheus-server.{namespace}.svc.cluster.local
      isDefault: true
      editable: false
"
    )
}

/// ConfigMap carrying the default Prometheus alerting rule group.
pub fn alert_rules_configmap(namespace: &str) -> String {
    format!(
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: prometheus-alerts
  namespace: {namespace}
data:
  alerts.yaml: |
    groups:
    - name: kubernetes-alerts
      rules:
      - alert: HighCPUUsage
        expr: 100 - (avg by(instance) (irate(node_cpu_seconds_total{{mode='idle'}}[5m])) * 100) > 80
        for: 5m
        labels:
          severity: warning
        annotations:
          summary: High CPU usage detected
          description: CPU usage is above 80% for 5 minutes on {{{{ $labels.instance }}}}
      - alert: HighMemoryUsage
        expr: (node_memory_MemTotal_bytes - node_memory_MemAvailable_bytes) / node_memory_MemTotal_bytes * 100 > 80
        for: 5m
        labels:
          severity: warning
        annotations:
          summary: High memory usage detected
          description: Memory usage is above 80% for 5 minutes on {{{{ $labels.instance }}}}
      - alert: KubernetesPodCrashLooping
        expr: increase(kube_pod_container_status_restarts_total[1h]) > 5
        for: 10m
        labels:
          severity: warning
        annotations:
          summary: Pod is crash looping
          description: Pod {{{{ $labels.pod }}}} in namespace {{{{ $labels.namespace }}}} is crash looping
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameterized_manifests_substitute_namespace() {
        let policy = allow_namespace_internal("default");
        assert!(policy.contains("name: default"));

        let datasource = grafana_datasource_configmap("monitoring");
        assert!(datasource
            .contains("url: http://prometheus-server.monitoring.svc.cluster.local"));

        let trivy = trivy_operator("security");
        assert!(trivy.contains("namespace: security"));
    }

    #[test]
    fn alert_rules_keep_template_placeholders_literal() {
        let rules = alert_rules_configmap("monitoring");
        assert!(rules.contains("{{ $labels.instance }}"));
        assert!(rules.contains("mode='idle'"));
    }
}
