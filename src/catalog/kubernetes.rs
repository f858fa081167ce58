// file: src/catalog/kubernetes.rs
// version: 1.0.0
// guid: d2a0ade5-60da-40be-97a4-da00a153f751

//! Kubernetes node preparation and cluster bootstrap scripts

use super::{heredoc, script, OsFamily};

/// Marker line carrying the control-plane certificate key
pub const CERT_KEY_MARKER: &str = "CERT_KEY=";
/// Marker line carrying the base `kubeadm join` command
pub const JOIN_CMD_MARKER: &str = "JOIN_CMD=";

const CALICO_DEFAULT_CIDR: &str = "192.168.0.0/16";

pub fn disable_swap() -> String {
    script(
        r#"
swapoff -a
sed -i '/\sswap\s/d' /etc/fstab
echo "Swap disabled"
"#,
    )
}

pub fn load_kernel_modules() -> String {
    script(&format!(
        "{}\nmodprobe overlay\nmodprobe br_netfilter\necho \"Kernel modules loaded\"",
        heredoc("/etc/modules-load.d/k8s.conf", "overlay\nbr_netfilter\n")
    ))
}

pub fn configure_sysctl() -> String {
    script(&format!(
        "{}\nsysctl --system > /dev/null\necho \"Sysctl configured\"",
        heredoc(
            "/etc/sysctl.d/k8s.conf",
            "net.bridge.bridge-nf-call-iptables  = 1\n\
             net.bridge.bridge-nf-call-ip6tables = 1\n\
             net.ipv4.ip_forward                 = 1\n",
        )
    ))
}

/// Install and configure containerd with the systemd cgroup driver
pub fn install_containerd(family: OsFamily) -> String {
    let install = match family {
        OsFamily::Rhel9 => {
            "dnf install -y dnf-plugins-core\n\
             dnf config-manager --add-repo https://download.docker.com/linux/centos/docker-ce.repo\n\
             dnf install -y containerd.io"
        }
        OsFamily::Sles15 => "zypper --non-interactive install -y containerd",
        OsFamily::Debian12 => {
            "export DEBIAN_FRONTEND=noninteractive\n\
             apt-get update -qq\n\
             apt-get install -y containerd"
        }
        OsFamily::Photon5 => "tdnf install -y containerd",
    };

    script(&format!(
        r#"{}
mkdir -p /etc/containerd
containerd config default > /etc/containerd/config.toml
sed -i 's/SystemdCgroup = false/SystemdCgroup = true/' /etc/containerd/config.toml
systemctl enable containerd
systemctl restart containerd
echo "Containerd installed and configured""#,
        install
    ))
}

/// Install kubelet, kubeadm and kubectl from pkgs.k8s.io
pub fn install_kubernetes_packages(family: OsFamily, version: &str) -> String {
    let rpm_repo = heredoc(
        "/etc/yum.repos.d/kubernetes.repo",
        &format!(
            "[kubernetes]\n\
             name=Kubernetes\n\
             baseurl=https://pkgs.k8s.io/core:/stable:/{v}/rpm/\n\
             enabled=1\n\
             gpgcheck=1\n\
             gpgkey=https://pkgs.k8s.io/core:/stable:/{v}/rpm/repodata/repomd.xml.key\n",
            v = version
        ),
    );

    let install = match family {
        OsFamily::Rhel9 => format!("{}\ndnf install -y kubelet kubeadm kubectl", rpm_repo),
        OsFamily::Photon5 => format!("{}\ntdnf install -y kubelet kubeadm kubectl", rpm_repo),
        OsFamily::Sles15 => format!(
            "rpm --import https://pkgs.k8s.io/core:/stable:/{v}/rpm/repodata/repomd.xml.key\n\
             zypper --non-interactive addrepo -f https://pkgs.k8s.io/core:/stable:/{v}/rpm/ kubernetes || true\n\
             zypper --non-interactive --gpg-auto-import-keys refresh\n\
             zypper --non-interactive install -y kubelet kubeadm kubectl",
            v = version
        ),
        OsFamily::Debian12 => format!(
            "export DEBIAN_FRONTEND=noninteractive\n\
             apt-get install -y apt-transport-https ca-certificates curl gpg\n\
             install -m 0755 -d /etc/apt/keyrings\n\
             curl -fsSL https://pkgs.k8s.io/core:/stable:/{v}/deb/Release.key | \\\n  gpg --batch --yes --dearmor -o /etc/apt/keyrings/kubernetes-apt-keyring.gpg\n\
             {list}\n\
             apt-get update -qq\n\
             apt-get install -y kubelet kubeadm kubectl\n\
             apt-mark hold kubelet kubeadm kubectl",
            v = version,
            list = heredoc(
                "/etc/apt/sources.list.d/kubernetes.list",
                &format!(
                    "deb [signed-by=/etc/apt/keyrings/kubernetes-apt-keyring.gpg] https://pkgs.k8s.io/core:/stable:/{}/deb/ /\n",
                    version
                ),
            )
        ),
    };

    script(&format!(
        "{}\nsystemctl enable --now kubelet\necho \"Kubernetes packages installed\"",
        install
    ))
}

/// Bootstrap the first control-plane node
pub fn kubeadm_init(pod_network_cidr: &str, control_plane_endpoint: &str) -> String {
    script(&format!(
        r#"
kubeadm init \
  --control-plane-endpoint "{}" \
  --upload-certs \
  --pod-network-cidr={}

mkdir -p $HOME/.kube
cp -f /etc/kubernetes/admin.conf $HOME/.kube/config
chown $(id -u):$(id -g) $HOME/.kube/config
echo "Control Plane initialized"
"#,
        control_plane_endpoint, pod_network_cidr
    ))
}

/// Install the Calico operator with the pod CIDR substituted into its resources
pub fn install_calico(pod_network_cidr: &str, version: &str) -> String {
    script(&format!(
        r#"
export KUBECONFIG=/etc/kubernetes/admin.conf
kubectl create -f https://raw.githubusercontent.com/projectcalico/calico/{v}/manifests/tigera-operator.yaml
curl -fsSL https://raw.githubusercontent.com/projectcalico/calico/{v}/manifests/custom-resources.yaml | \
  sed "s#{default}#{cidr}#g" | \
  kubectl apply -f -
i=0
until kubectl get pods -n calico-system -l k8s-app=calico-node 2>/dev/null | grep -q calico-node; do
  i=$((i + 1))
  if [ $i -ge 60 ]; then
    echo "calico-node pods did not appear" >&2
    exit 1
  fi
  sleep 5
done
kubectl wait --for=condition=Ready pods -l k8s-app=calico-node -n calico-system --timeout=300s
echo "Calico CNI installed"
"#,
        v = version,
        default = CALICO_DEFAULT_CIDR,
        cidr = pod_network_cidr
    ))
}

/// Print a fresh certificate key and base join command, one marker line each
pub fn generate_join_artifacts() -> String {
    script(&format!(
        r#"
CERT_KEY=$(kubeadm init phase upload-certs --upload-certs | tail -n 1)
JOIN_CMD=$(kubeadm token create --print-join-command)
echo "{}${{CERT_KEY}}"
echo "{}${{JOIN_CMD}}"
"#,
        CERT_KEY_MARKER, JOIN_CMD_MARKER
    ))
}

/// Control-plane join command for an additional master
pub fn master_join_command(join_command: &str, certificate_key: &str) -> String {
    format!(
        "{} --control-plane --certificate-key {}",
        join_command, certificate_key
    )
}

pub fn master_join(join_command: &str, certificate_key: &str) -> String {
    script(&format!(
        r#"
{}

mkdir -p $HOME/.kube
cp -f /etc/kubernetes/admin.conf $HOME/.kube/config
chown $(id -u):$(id -g) $HOME/.kube/config
echo "Master joined the cluster"
"#,
        master_join_command(join_command, certificate_key)
    ))
}

pub fn worker_join(join_command: &str) -> String {
    script(&format!(
        "{}\necho \"Worker joined the cluster\"",
        join_command
    ))
}

/// Install MetalLB and publish `ip_range` as a layer 2 address pool
pub fn install_metallb(ip_range: &str, version: &str) -> String {
    let pool = format!(
        r#"apiVersion: metallb.io/v1beta1
kind: IPAddressPool
metadata:
  name: default-pool
  namespace: metallb-system
spec:
  addresses:
  - {}
---
apiVersion: metallb.io/v1beta1
kind: L2Advertisement
metadata:
  name: default
  namespace: metallb-system
spec:
  ipAddressPools:
  - default-pool
"#,
        ip_range
    );

    script(&format!(
        r#"
export KUBECONFIG=/etc/kubernetes/admin.conf
kubectl get configmap kube-proxy -n kube-system -o yaml | \
  sed -e 's/strictARP: false/strictARP: true/' | \
  kubectl apply -f - -n kube-system
kubectl apply -f https://raw.githubusercontent.com/metallb/metallb/{}/config/manifests/metallb-native.yaml
kubectl wait --for=condition=Ready pods -l app=metallb -n metallb-system --timeout=120s
cat <<'CP_EOF' | kubectl apply -f -
{}
CP_EOF
echo "MetalLB installed"
"#,
        version,
        pool.trim_end()
    ))
}

pub fn check_cluster_status() -> String {
    script(
        r#"
export KUBECONFIG=/etc/kubernetes/admin.conf
kubectl get nodes -o wide
kubectl get pods -A
"#,
    )
}
